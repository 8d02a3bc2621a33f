// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use opentelemetry::{
    InstrumentationScope, KeyValue,
    metrics::{Counter, Histogram, Meter, MeterProvider},
};

use super::{CacheActivity, CacheOperation, attributes};

const METER_NAME: &str = "stowage";
const VERSION: &str = "v0.1.0";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";
const CACHE_EVENT_COUNT_NAME: &str = "cache.event.count";
const CACHE_OPERATION_DURATION_NAME: &str = "cache.operation.duration";

pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

#[derive(Debug, Clone)]
pub(crate) struct Instruments {
    event_counter: Counter<u64>,
    operation_duration: Histogram<f64>,
}

impl Instruments {
    pub fn new(meter_provider: &dyn MeterProvider) -> Self {
        let meter = create_meter(meter_provider);
        Self {
            event_counter: meter
                .u64_counter(CACHE_EVENT_COUNT_NAME)
                .with_description("Cache events")
                .with_unit("{event}")
                .build(),
            operation_duration: meter
                .f64_histogram(CACHE_OPERATION_DURATION_NAME)
                .with_description("Cache operation duration")
                .with_unit("s")
                .build(),
        }
    }

    pub fn record(&self, store: &str, operation: CacheOperation, activity: CacheActivity, duration: Duration) {
        let attrs = [
            KeyValue::new(attributes::CACHE_NAME, store.to_owned()),
            KeyValue::new(attributes::CACHE_OPERATION_NAME, operation.as_str()),
            KeyValue::new(attributes::CACHE_ACTIVITY_NAME, activity.as_str()),
        ];
        self.event_counter.add(1, &attrs);
        self.operation_duration.record(duration.as_secs_f64(), &attrs);
    }
}
