//! Front-end configuration
//!
//! Configuration is plain serde data loaded from YAML. Every section has
//! defaults, and [`DownlinkConfig::validate`] checks the whole tree before any
//! stage is built, so a bad setting fails before the first frame arrives.
//!
//! ```rust
//! use downlink::config::DownlinkConfig;
//!
//! let yaml = r#"
//! frame:
//!   frame_length: 1024
//!   rs_parity_length: 128
//! channels:
//!   - spacecraft: 42
//!     virtual_channel: 16
//! datasets:
//!   - name: terra-modis
//!     spacecraft: 42
//!     appids:
//!       - id: 64
//!         vcids: [16]
//! "#;
//! let config = DownlinkConfig::from_yaml_str(yaml)?;
//! assert_eq!(config.path.fill_byte, 0xC9);
//! # Ok::<(), downlink::TelemetryError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::types::PacketLength;
use crate::{Result, TelemetryError};

/// Default fill byte for padded packets.
pub const DEFAULT_FILL_BYTE: u8 = 0xC9;
/// Packets claiming more than this many bytes are treated as corruption.
pub const DEFAULT_MAX_RATIONAL_PACKET_SIZE: usize = 8192;
/// Consecutive output failures tolerated before a channel starts discarding.
pub const DEFAULT_MAX_CONSECUTIVE_IO_ERRORS: u32 = 5;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DownlinkConfig {
    pub frame: FrameLayoutConfig,
    pub quality: FrameQualityConfig,
    pub routing: RoutingConfig,
    pub channels: Vec<ChannelConfig>,
    pub path: PathConfig,
    pub datasets: Vec<DatasetConfig>,
    pub output: OutputConfig,
}

/// Frame container format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    /// CCSDS version-2 CADU: replay flag and spare bits in the signaling field
    #[default]
    Cadu,
    /// AOS transfer frame: signaling field carries the frame count cycle
    Aos,
}

/// Physical layout of one frame as delivered by the synchronizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameLayoutConfig {
    pub format: FrameFormat,
    /// Bytes per frame, including the sync marker when present
    pub frame_length: usize,
    /// 4 when the synchronizer leaves the attached sync marker in place
    pub sync_marker_length: usize,
    pub header_error_control: bool,
    pub insert_zone_length: usize,
    pub has_ocf: bool,
    pub has_crc: bool,
    pub rs_parity_length: usize,
}

impl Default for FrameLayoutConfig {
    fn default() -> Self {
        Self {
            format: FrameFormat::Cadu,
            frame_length: 1024,
            sync_marker_length: 4,
            header_error_control: false,
            insert_zone_length: 0,
            has_ocf: false,
            has_crc: false,
            rs_parity_length: 128,
        }
    }
}

/// Frame-level quality checks applied before routing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameQualityConfig {
    pub check_crc: bool,
    pub delete_crc_errors: bool,
    pub delete_rs_uncorrectable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Drop idle frames (virtual channel 63) before routing
    pub drop_fill_frames: bool,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self { drop_fill_frames: true }
    }
}

/// Service applied to one virtual channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelService {
    /// Packet reassembly (M_PDU)
    #[default]
    Path,
    /// Raw bitstream extraction (B_PDU)
    Bitstream,
}

/// One routed virtual channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelConfig {
    pub spacecraft: u16,
    pub virtual_channel: u8,
    #[serde(default)]
    pub service: ChannelService,
    /// Check the frame counter on this channel
    #[serde(default = "default_true")]
    pub check_sequence: bool,
}

/// Packet reassembly settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathConfig {
    pub fill_byte: u8,
    pub max_rational_packet_size: usize,
    /// Packets shorter than this (total bytes) are flagged invalid-length
    pub min_packet_length: usize,
    /// Packets longer than this (total bytes) are flagged invalid-length
    pub max_packet_length: usize,
    pub discard_idle_packets: bool,
    /// Deliver packets padded with fill instead of dropping them
    pub keep_fill_packets: bool,
    /// On flush, pad and deliver a held partial packet instead of dropping it
    pub finalize_partial_on_flush: bool,
    pub check_packet_sequence: bool,
}

impl Default for PathConfig {
    fn default() -> Self {
        Self {
            fill_byte: DEFAULT_FILL_BYTE,
            max_rational_packet_size: DEFAULT_MAX_RATIONAL_PACKET_SIZE,
            min_packet_length: 7,
            max_packet_length: DEFAULT_MAX_RATIONAL_PACKET_SIZE,
            discard_idle_packets: true,
            keep_fill_packets: true,
            finalize_partial_on_flush: true,
            check_packet_sequence: true,
        }
    }
}

/// Construction record type byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    #[default]
    Pds,
    Eds,
}

/// One Sorcerer dataset (a set of application IDs written together).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetConfig {
    pub name: String,
    pub spacecraft: u16,
    #[serde(default)]
    pub kind: DatasetKind,
    #[serde(default)]
    pub is_test: bool,
    /// Only accept packets with the quicklook bit set
    #[serde(default)]
    pub quicklook: bool,
    pub appids: Vec<AppidConfig>,
}

/// Packet secondary header time format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "format", rename_all = "snake_case")]
pub enum TimeCodeConfig {
    /// 8-byte day segmented time at byte 6
    Cds,
    /// 4 coarse + `fine_bytes` fine octets at byte 6, counted from an epoch
    /// `epoch_offset_seconds` after 1958-01-01
    Cuc { fine_bytes: u8, epoch_offset_seconds: i64 },
}

impl Default for TimeCodeConfig {
    fn default() -> Self {
        TimeCodeConfig::Cds
    }
}

/// Accepted packet sizes (total bytes including the primary header).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthRuleConfig {
    Range { min: usize, max: usize },
    Allowed(Vec<usize>),
}

impl Default for LengthRuleConfig {
    fn default() -> Self {
        LengthRuleConfig::Range { min: PacketLength::MIN_TOTAL, max: PacketLength::MAX_TOTAL }
    }
}

/// One application ID inside a dataset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppidConfig {
    pub id: u16,
    /// One or two virtual channels carrying this application
    pub vcids: Vec<u8>,
    #[serde(default = "default_step")]
    pub sequence_step: i32,
    #[serde(default)]
    pub time_code: TimeCodeConfig,
    /// Written as a one-key map, `range: {min, max}` or `allowed: [...]`
    #[serde(default, with = "serde_yaml_ng::with::singleton_map")]
    pub lengths: LengthRuleConfig,
}

/// Where and how dataset files are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    /// Rotate data files after this many bytes; 0 disables rotation
    pub bytes_per_file: u64,
    pub max_consecutive_io_errors: u32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("."),
            bytes_per_file: 0,
            max_consecutive_io_errors: DEFAULT_MAX_CONSECUTIVE_IO_ERRORS,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_step() -> i32 {
    1
}

impl DownlinkConfig {
    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: DownlinkConfig = serde_yaml_ng::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        debug!("Loaded configuration from {}", path.display());
        Self::from_yaml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        crate::frame::FrameLayout::new(&self.frame)?;
        self.path.validate()?;

        let mut channels = HashSet::new();
        for channel in &self.channels {
            if channel.virtual_channel > 63 {
                return Err(TelemetryError::config_error(
                    "channels",
                    format!("virtual channel {} exceeds 63", channel.virtual_channel),
                ));
            }
            if !channels.insert((channel.spacecraft, channel.virtual_channel)) {
                return Err(TelemetryError::config_error(
                    "channels",
                    format!(
                        "spacecraft {} virtual channel {} configured twice",
                        channel.spacecraft, channel.virtual_channel
                    ),
                ));
            }
        }

        for dataset in &self.datasets {
            dataset.validate()?;
            for appid in &dataset.appids {
                for vcid in &appid.vcids {
                    if !channels.contains(&(dataset.spacecraft, *vcid)) {
                        return Err(TelemetryError::config_error(
                            "datasets",
                            format!(
                                "dataset '{}' application {} uses spacecraft {} virtual channel {} which is not configured",
                                dataset.name, appid.id, dataset.spacecraft, vcid
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }
}

impl PathConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_packet_length < 7 {
            return Err(TelemetryError::config_error(
                "path",
                format!("min_packet_length {} is below the 7-byte minimum", self.min_packet_length),
            ));
        }
        if self.min_packet_length > self.max_packet_length {
            return Err(TelemetryError::config_error(
                "path",
                format!(
                    "min_packet_length {} exceeds max_packet_length {}",
                    self.min_packet_length, self.max_packet_length
                ),
            ));
        }
        if self.max_rational_packet_size < 7 {
            return Err(TelemetryError::config_error(
                "path",
                "max_rational_packet_size must allow at least a 7-byte packet",
            ));
        }
        Ok(())
    }
}

impl DatasetConfig {
    pub fn validate(&self) -> Result<()> {
        let section = format!("dataset '{}'", self.name);
        if self.name.is_empty() || !self.name.is_ascii() {
            return Err(TelemetryError::config_error(section, "name must be non-empty ASCII"));
        }
        if self.appids.is_empty() {
            return Err(TelemetryError::config_error(section, "at least one application ID is required"));
        }
        let mut seen = HashSet::new();
        for appid in &self.appids {
            if appid.id > 0x7FF {
                return Err(TelemetryError::config_error(
                    section,
                    format!("application ID {} exceeds 11 bits", appid.id),
                ));
            }
            if !seen.insert(appid.id) {
                return Err(TelemetryError::config_error(
                    section,
                    format!("application ID {} listed twice", appid.id),
                ));
            }
            if appid.vcids.is_empty() || appid.vcids.len() > 2 {
                return Err(TelemetryError::config_error(
                    section,
                    format!("application {} must name one or two virtual channels", appid.id),
                ));
            }
            if appid.sequence_step == 0 || appid.sequence_step.unsigned_abs() >= 0x4000 {
                return Err(TelemetryError::config_error(
                    section,
                    format!("application {} has unusable sequence step {}", appid.id, appid.sequence_step),
                ));
            }
            if let TimeCodeConfig::Cuc { fine_bytes, .. } = appid.time_code {
                if fine_bytes > 3 {
                    return Err(TelemetryError::config_error(
                        section,
                        format!("application {} CUC fine field of {} bytes is unsupported", appid.id, fine_bytes),
                    ));
                }
            }
            crate::sorcerer::LengthRule::from_config(&appid.lengths)
                .map_err(|reason| TelemetryError::config_error(section.clone(), reason))?;
        }
        Ok(())
    }
}
