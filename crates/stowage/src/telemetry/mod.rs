// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-operation telemetry for repositories.
//!
//! Every repository call is timed and recorded as a `cache.event` tracing
//! event when logs are enabled, and as OpenTelemetry metrics when the
//! `metrics` feature is enabled and a meter provider was given.

use std::{sync::Arc, time::Duration};

use tracing::Level;

pub(crate) mod attributes;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
#[cfg(test)]
pub(crate) mod testing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOperation {
    Get,
    Has,
    Save,
    SaveDeferred,
    Commit,
    Delete,
    Clear,
}

impl CacheOperation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::Has => "cache.has",
            Self::Save => "cache.save",
            Self::SaveDeferred => "cache.save_deferred",
            Self::Commit => "cache.commit",
            Self::Delete => "cache.delete",
            Self::Clear => "cache.clear",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheActivity {
    Hit,
    Miss,
    Stored,
    Deferred,
    Committed,
    Deleted,
    Cleared,
    Rejected,
    Error,
}

impl CacheActivity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hit => "cache.hit",
            Self::Miss => "cache.miss",
            Self::Stored => "cache.stored",
            Self::Deferred => "cache.deferred",
            Self::Committed => "cache.committed",
            Self::Deleted => "cache.deleted",
            Self::Cleared => "cache.cleared",
            Self::Rejected => "cache.rejected",
            Self::Error => "cache.error",
        }
    }

    pub fn severity(self) -> Level {
        match self {
            Self::Hit | Self::Miss | Self::Deferred => Level::DEBUG,
            Self::Stored | Self::Committed | Self::Deleted | Self::Cleared | Self::Rejected => Level::INFO,
            Self::Error => Level::ERROR,
        }
    }

    /// Activity for an operation that reports success as a flag.
    pub fn from_flag(done: bool, success: Self) -> Self {
        if done { success } else { Self::Rejected }
    }
}

/// Telemetry shared by every repository of one manager.
#[derive(Clone, Debug, Default)]
pub(crate) struct Telemetry {
    inner: Arc<TelemetryInner>,
}

#[derive(Debug, Default)]
struct TelemetryInner {
    logs_enabled: bool,
    #[cfg(any(feature = "metrics", test))]
    instruments: Option<metrics::Instruments>,
}

impl Telemetry {
    pub fn new(logs_enabled: bool, #[cfg(any(feature = "metrics", test))] instruments: Option<metrics::Instruments>) -> Self {
        Self {
            inner: Arc::new(TelemetryInner {
                logs_enabled,
                #[cfg(any(feature = "metrics", test))]
                instruments,
            }),
        }
    }

    pub fn is_enabled(&self) -> bool {
        #[cfg(any(feature = "metrics", test))]
        if self.inner.instruments.is_some() {
            return true;
        }
        self.inner.logs_enabled
    }

    pub fn record(&self, store: &str, operation: CacheOperation, activity: CacheActivity, duration: Duration) {
        #[cfg(any(feature = "metrics", test))]
        if let Some(instruments) = &self.inner.instruments {
            instruments.record(store, operation, activity, duration);
        }

        if self.inner.logs_enabled {
            emit(store, operation, activity, duration);
        }
    }
}

fn emit(store: &str, operation: CacheOperation, activity: CacheActivity, duration: Duration) {
    let op = operation.as_str();
    let ev = activity.as_str();
    let duration_ns = duration.as_nanos();

    // Tracing levels must be constants, hence one arm per level.
    // Field names must match attributes.rs.
    macro_rules! emit_event {
        ($level:ident) => {
            tracing::$level!(
                cache.name = store,
                cache.operation = op,
                cache.activity = ev,
                cache.duration_ns = duration_ns,
                "cache.event"
            )
        };
    }

    let level = activity.severity();
    if level == Level::ERROR {
        emit_event!(error);
    } else if level == Level::INFO {
        emit_event!(info);
    } else {
        emit_event!(debug);
    }
}
