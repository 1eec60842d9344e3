//! Quartz scroll-wheel injection.

use super::{DeltaAccumulator, ScrollEmitter, ScrollUnit};
use core_graphics::event::{CGEvent, CGEventTapLocation, EventField, ScrollEventUnit};
use core_graphics::event_source::{CGEventSource, CGEventSourceStateID};
use tracing::trace;

/// Posts scroll-wheel events at the HID level.
///
/// Wheel axis 1 is vertical and axis 2 horizontal; positive values move
/// content down and right, which is the direction the pointer moved.
pub struct QuartzScrollEmitter {
    unit: ScrollUnit,
    invert: bool,
    accumulator: DeltaAccumulator,
}

impl QuartzScrollEmitter {
    pub fn new(unit: ScrollUnit, invert: bool) -> Self {
        Self {
            unit,
            invert,
            accumulator: DeltaAccumulator::new(),
        }
    }

    fn post(&self, wheel_x: i32, wheel_y: i32) -> crate::Result<()> {
        // CF objects are created per event so the emitter stays Send
        let source = CGEventSource::new(CGEventSourceStateID::HIDSystemState)
            .map_err(|_| crate::Error::Emit("failed to create CGEventSource".into()))?;
        let units = match self.unit {
            ScrollUnit::Pixel => ScrollEventUnit::PIXEL,
            ScrollUnit::Line => ScrollEventUnit::LINE,
        };
        let event = CGEvent::new_scroll_event(source, units, 2, wheel_y, wheel_x, 0)
            .map_err(|_| crate::Error::Emit("failed to create scroll event".into()))?;
        if self.unit == ScrollUnit::Pixel {
            event.set_integer_value_field(EventField::SCROLL_WHEEL_EVENT_IS_CONTINUOUS, 1);
        }
        event.post(CGEventTapLocation::HID);
        Ok(())
    }
}

impl ScrollEmitter for QuartzScrollEmitter {
    fn emit(&mut self, dx: f64, dy: f64) -> crate::Result<()> {
        let sign = if self.invert { -1.0 } else { 1.0 };
        let (wheel_x, wheel_y) = self.accumulator.push(dx * sign, dy * sign);
        if wheel_x == 0 && wheel_y == 0 {
            return Ok(());
        }
        trace!(wheel_x, wheel_y, "posting scroll event");
        self.post(wheel_x, wheel_y)
    }

    fn name(&self) -> &'static str {
        "quartz"
    }
}
