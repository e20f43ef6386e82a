//! Virtual channel demultiplexer

use std::collections::BTreeMap;
use tracing::{debug, trace};

use super::receiver::{FrameBroadcaster, FrameReceiver};
use crate::frame::{AnyView, FrameLayout, FrameView};
use crate::types::{ComponentStatus, Frame, StatusItem, StatusReporter};
use crate::Result;

/// Routing key: spacecraft ID and virtual channel ID.
pub type VcKey = (u16, u8);

/// Routes frames by `(spacecraft, virtual channel)`.
///
/// Several receivers on one key share a [`FrameBroadcaster`]. Fill frames
/// (virtual channel 63) are marked and, when configured, dropped before
/// lookup. Frames without a route go to the dead-letter receiver when one
/// is set and are otherwise counted and dropped.
pub struct VcRouter {
    layout: FrameLayout,
    routes: BTreeMap<VcKey, FrameBroadcaster>,
    dead_letter: Option<Box<dyn FrameReceiver>>,
    drop_fill_frames: bool,
    routed: u64,
    fill_frames: u64,
    unrouted: u64,
}

impl VcRouter {
    pub fn new(layout: FrameLayout, drop_fill_frames: bool) -> Self {
        Self {
            layout,
            routes: BTreeMap::new(),
            dead_letter: None,
            drop_fill_frames,
            routed: 0,
            fill_frames: 0,
            unrouted: 0,
        }
    }

    pub fn add_route(&mut self, spacecraft: u16, virtual_channel: u8, receiver: Box<dyn FrameReceiver>) {
        let broadcaster = self.routes.entry((spacecraft, virtual_channel)).or_default();
        broadcaster.add(receiver);
        debug!(
            "Route spacecraft {} vc {} -> {} receiver(s)",
            spacecraft,
            virtual_channel,
            broadcaster.len()
        );
    }

    pub fn set_dead_letter(&mut self, receiver: Box<dyn FrameReceiver>) {
        self.dead_letter = Some(receiver);
    }

    pub fn keys(&self) -> impl Iterator<Item = VcKey> + '_ {
        self.routes.keys().copied()
    }
}

impl FrameReceiver for VcRouter {
    fn put_frame(&mut self, frame: &mut Frame) -> Result<()> {
        if frame.is_deleted() {
            return Ok(());
        }

        let (key, fill) = {
            let view = AnyView::new(&self.layout, &*frame);
            ((view.spacecraft(), view.virtual_channel()), view.is_fill_frame())
        };
        if fill {
            frame.set_fill_frame(true);
            self.fill_frames += 1;
            if self.drop_fill_frames {
                return Ok(());
            }
        }

        match self.routes.get_mut(&key) {
            Some(route) => {
                self.routed += 1;
                route.put_frame(frame)
            }
            None => {
                self.unrouted += 1;
                trace!("No route for spacecraft {} vc {}", key.0, key.1);
                match self.dead_letter.as_mut() {
                    Some(dead_letter) => dead_letter.put_frame(frame),
                    None => Ok(()),
                }
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        for route in self.routes.values_mut() {
            route.flush()?;
        }
        if let Some(dead_letter) = self.dead_letter.as_mut() {
            dead_letter.flush()?;
        }
        Ok(())
    }

    /// Components behind each route are reported as `"{scid}/{vcid} {name}"`.
    fn report_status(&self, out: &mut Vec<ComponentStatus>) {
        out.push(ComponentStatus::of(self));
        for ((spacecraft, virtual_channel), route) in &self.routes {
            let mut behind = Vec::new();
            route.report_status(&mut behind);
            out.extend(behind.into_iter().map(|mut component| {
                component.component = format!("{}/{} {}", spacecraft, virtual_channel, component.component);
                component
            }));
        }
        if let Some(dead_letter) = &self.dead_letter {
            dead_letter.report_status(out);
        }
    }
}

impl StatusReporter for VcRouter {
    fn status_name(&self) -> String {
        "vc_router".to_string()
    }

    fn status(&self) -> Vec<StatusItem> {
        vec![
            StatusItem::new("routed_frames", self.routed),
            StatusItem::new("fill_frames", self.fill_frames),
            StatusItem::new("unrouted_frames", self.unrouted),
        ]
    }
}
