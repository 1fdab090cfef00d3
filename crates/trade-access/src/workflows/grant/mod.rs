//! The Trade Access Program grant workflow.
//!
//! Module map mirrors the moving parts of the back office: [`applications`]
//! persists the applicant aggregate, [`company`] caches the external
//! company-data provider, [`notify`] fans emails out to the transactional
//! provider, [`evidence`] gates out-of-band uploads behind signed
//! magic-links, and [`process`] runs the review workflow itself.

pub mod applications;
pub mod company;
pub mod evidence;
pub mod notify;
pub(crate) mod pagination;
pub mod process;
