//! # vfk
//!
//! Reader and validator for the head of Czech cadastral VFK exchange files.
//!
//! ## Features
//!
//! - Structural validation of the header block (version, code page, groups,
//!   validity period, change indicator), every problem reported in one pass
//! - Identity extraction: zoning id and validity date of a valid extract
//! - No database or network dependencies
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::path::Path;
//! use vfk::{check_head, read_head};
//!
//! let head = read_head(Path::new("extract.vfk"))?;
//! let report = check_head(&head);
//! if let Some(identity) = report.identity {
//!     println!("{} valid at {}", identity.zoning_id, identity.valid_date);
//! } else {
//!     for problem in &report.problems {
//!         println!("problem: {problem}");
//!     }
//! }
//! ```

pub mod error;
pub mod head;

pub use error::VfkError;
pub use head::{
    check_head, extract_identity, head_problems, read_head, HeadIdentity, HeadReport, HEAD_LINES,
};
