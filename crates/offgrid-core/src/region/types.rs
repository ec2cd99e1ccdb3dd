//! Region descriptor types.

use crate::config::RegionConfig;
use crate::error::{OffgridError, Result};
use crate::geo::{BoundingBox, ZoomRange};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Maximum length of a caller-supplied region id.
const MAX_REGION_ID_LEN: usize = 128;

/// Why a region was downloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionKind {
    Route,
    Manual,
}

impl RegionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionKind::Route => "route",
            RegionKind::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "route" => Some(RegionKind::Route),
            "manual" => Some(RegionKind::Manual),
            _ => None,
        }
    }
}

/// Download lifecycle state of a region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegionStatus {
    Pending,
    Downloading,
    Ready,
    Failed,
}

impl RegionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RegionStatus::Pending => "pending",
            RegionStatus::Downloading => "downloading",
            RegionStatus::Ready => "ready",
            RegionStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RegionStatus::Pending),
            "downloading" => Some(RegionStatus::Downloading),
            "ready" => Some(RegionStatus::Ready),
            "failed" => Some(RegionStatus::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RegionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A caller's request to make a region available offline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionRequest {
    pub id: String,
    pub name: String,
    pub bounds: BoundingBox,
    pub zoom: ZoomRange,
    pub kind: RegionKind,
    /// Lifetime of the region once it is ready.
    pub ttl: Duration,
}

impl RegionRequest {
    /// Manual region with the default zoom range and TTL.
    pub fn new(id: impl Into<String>, name: impl Into<String>, bounds: BoundingBox) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            bounds,
            zoom: ZoomRange::default(),
            kind: RegionKind::Manual,
            ttl: RegionConfig::DEFAULT_TTL,
        }
    }

    pub fn with_zoom(mut self, zoom: ZoomRange) -> Self {
        self.zoom = zoom;
        self
    }

    pub fn with_kind(mut self, kind: RegionKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn validate(&self) -> Result<()> {
        validate_region_id(&self.id)?;
        self.bounds.validate()?;
        ZoomRange::new(self.zoom.min, self.zoom.max)?;
        if self.ttl < RegionConfig::MIN_TTL || self.ttl > RegionConfig::MAX_TTL {
            return Err(OffgridError::invalid(
                "ttl",
                format!(
                    "must be between 1s and {}s, got {:?}",
                    RegionConfig::MAX_TTL.as_secs(),
                    self.ttl
                ),
            ));
        }
        Ok(())
    }
}

/// Reject empty, oversized or control-character ids.
pub fn validate_region_id(id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(OffgridError::invalid("region_id", "must not be empty"));
    }
    if id.len() > MAX_REGION_ID_LEN {
        return Err(OffgridError::invalid(
            "region_id",
            format!("longer than {} bytes", MAX_REGION_ID_LEN),
        ));
    }
    if id.chars().any(char::is_control) {
        return Err(OffgridError::invalid(
            "region_id",
            "contains control characters",
        ));
    }
    Ok(())
}

/// Stored description of a region and its download state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegionDescriptor {
    pub id: String,
    pub name: String,
    pub bounds: BoundingBox,
    pub min_zoom: u8,
    pub max_zoom: u8,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub kind: RegionKind,
    pub size_bytes: Option<u64>,
    pub status: RegionStatus,
    pub ttl_secs: u64,
    /// Failure reason of the last attempt, if it failed.
    pub last_error: Option<String>,
}

impl RegionDescriptor {
    /// Fresh descriptor for a request accepted at `now`.
    pub fn pending(request: &RegionRequest, now: DateTime<Utc>) -> Result<Self> {
        let ttl_secs = ttl_whole_secs(request.ttl);
        Ok(Self {
            id: request.id.clone(),
            name: request.name.clone(),
            bounds: request.bounds,
            min_zoom: request.zoom.min,
            max_zoom: request.zoom.max,
            created_at: now,
            expires_at: expiry_after(now, Duration::from_secs(ttl_secs))?,
            kind: request.kind,
            size_bytes: None,
            status: RegionStatus::Pending,
            ttl_secs,
            last_error: None,
        })
    }

    pub fn zoom(&self) -> ZoomRange {
        ZoomRange {
            min: self.min_zoom,
            max: self.max_zoom,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// True once `now >= expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Ready and not yet expired.
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.status == RegionStatus::Ready && !self.is_expired(now)
    }
}

/// `now + ttl`, or `InvalidInput` if the result is not representable.
pub(crate) fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| OffgridError::invalid("ttl", format!("{:?} is out of range", ttl)))
}

/// Whole seconds, rounding a fractional second up.
fn ttl_whole_secs(ttl: Duration) -> u64 {
    ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)
}
