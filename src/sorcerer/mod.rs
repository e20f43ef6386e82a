//! Sorcerer: production dataset construction
//!
//! Packets routed to a dataset are filed per application ID. Each [`Appid`]
//! keeps a [`GapList`], [`FillList`] and [`WrongLengthList`] plus timing
//! bounds; [`PdsOutput`] writes the data files and, on flush, a
//! [`ConstructionRecord`] summarizing them.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use downlink::config::{DatasetConfig, OutputConfig};
//! use downlink::sorcerer::{PdsHandle, PdsOutput, SessionContext};
//!
//! # fn build(dataset: &DatasetConfig) -> downlink::Result<()> {
//! let session = Arc::new(SessionContext::new());
//! let handle = PdsHandle::new(PdsOutput::new(dataset, &OutputConfig::default(), session.clone())?);
//! // ... route packets to clones of `handle` ...
//! if let Some(record) = handle.finish()? {
//!     println!("{} packets in {} files", record.total_packets, record.files.len());
//! }
//! session.reset();
//! # Ok(())
//! # }
//! ```

mod appid;
mod construction_record;
mod fill_list;
mod gap_list;
mod kernel;
mod pds;
mod session;
mod wrong_length;

pub use appid::Appid;
pub use construction_record::{
    AppidRecord, ConstructionRecord, FileAppidRange, FileRecord, GapRecord, MAJOR_VERSION, MINOR_VERSION, NAME_LENGTH,
};
pub use fill_list::{FillEntry, FillList};
pub use gap_list::{Gap, GapList};
pub use kernel::{PacketKernel, TimeCode};
pub use pds::{PdsHandle, PdsOutput, QUICKLOOK_BYTE, QUICKLOOK_MASK, has_quicklook_flag};
pub use session::SessionContext;
pub use wrong_length::{LengthRule, WrongLengthList};
