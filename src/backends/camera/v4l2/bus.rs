// SPDX-License-Identifier: GPL-3.0-only

//! Bus message classification

use crate::backends::camera::types::BusEvent;
use crate::constants::messages;
use gstreamer::MessageView;
use gstreamer::prelude::*;

/// Map a bus message to the event the bridge acts on
pub fn classify(message: &gstreamer::MessageRef) -> BusEvent {
    match message.view() {
        MessageView::Element(element) => match element.structure() {
            Some(s) if s.has_name(messages::IMAGE_DONE) => BusEvent::CaptureDone {
                filename: s
                    .get::<String>(messages::FILENAME_FIELD)
                    .unwrap_or_default(),
            },
            _ => BusEvent::Ignored,
        },
        MessageView::Warning(warning) => BusEvent::Warning {
            source: warning.src().map(|s| s.name().to_string()),
            message: warning.error().to_string(),
            debug: warning.debug().map(|d| d.to_string()),
        },
        MessageView::Error(err) => BusEvent::Error {
            source: err.src().map(|s| s.name().to_string()),
            message: err.error().to_string(),
            debug: err.debug().map(|d| d.to_string()),
        },
        _ => BusEvent::Ignored,
    }
}
