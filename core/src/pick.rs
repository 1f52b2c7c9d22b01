//! Pick-point channel between an authoring session and a floor-plan viewer
//!
//! The exchange is line based and allows one outstanding request:
//!
//! ```text
//! author -> viewer   {"nodes":[...],"edges":[...]}   (snapshot, once at launch)
//! author -> viewer   pick
//! viewer -> author   point <x> <y>                   (world coordinates of the next click)
//! ```
//!
//! A hang-up on either side shows up as EOF or a broken pipe; the authoring
//! side then drops back to typed coordinates.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use tracing::{debug, info, warn};

use crate::error::{GraphError, PickError};
use crate::model::{Edge, Node};
use crate::operator::{ask_coordinates, Operator};
use crate::session::AuthoringContext;
use crate::transform::{FloorCalibration, PixelPoint, WorldPoint};

/// Request token sent by the authoring side.
pub const REQUEST: &str = "pick";

const REPLY_PREFIX: &str = "point";

/// Point-in-time copy of the graph handed to the viewer at launch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
}

impl Snapshot {
    /// Write the snapshot as a single line.
    pub fn write_line<W: Write>(&self, mut writer: W) -> Result<(), PickError> {
        serde_json::to_writer(&mut writer, self)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Read the snapshot line sent at launch.
    pub fn read_line<R: BufRead>(reader: &mut R) -> Result<Self, PickError> {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 {
            return Err(PickError::Closed);
        }
        Ok(serde_json::from_str(&line)?)
    }
}

/// Format a reply line (without the newline).
pub fn encode_reply(point: WorldPoint) -> String {
    format!("{} {} {}", REPLY_PREFIX, point.x, point.y)
}

/// Parse a reply line into a world point.
pub fn decode_reply(line: &str) -> Result<WorldPoint, PickError> {
    let bad = || PickError::Protocol(format!("unexpected reply {:?}", line.trim()));

    let mut parts = line.split_whitespace();
    if parts.next() != Some(REPLY_PREFIX) {
        return Err(bad());
    }
    let x: f64 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    let y: f64 = parts.next().and_then(|s| s.parse().ok()).ok_or_else(bad)?;
    if parts.next().is_some() || !x.is_finite() || !y.is_finite() {
        return Err(bad());
    }
    Ok(WorldPoint::new(x, y))
}

/// Authoring-side transport to a viewer.
pub trait PickLink {
    /// Ask the viewer for the next clicked point.
    fn request(&mut self) -> Result<(), PickError>;

    /// Block until the viewer replies or hangs up.
    fn receive(&mut self) -> Result<WorldPoint, PickError>;
}

/// [`PickLink`] over a reader/writer pair, e.g. a child process's stdout/stdin.
pub struct StreamLink<R, W> {
    reader: R,
    writer: W,
}

impl<R: BufRead, W: Write> StreamLink<R, W> {
    /// Link over a reader for replies and a writer for requests.
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }
}

impl<R: BufRead, W: Write> PickLink for StreamLink<R, W> {
    fn request(&mut self) -> Result<(), PickError> {
        writeln!(self.writer, "{}", REQUEST)?;
        self.writer.flush()?;
        debug!("pick request sent");
        Ok(())
    }

    fn receive(&mut self) -> Result<WorldPoint, PickError> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Err(PickError::Closed);
        }
        debug!(reply = line.trim(), "pick reply received");
        decode_reply(&line)
    }
}

/// Authoring-side view of the viewer connection.
#[derive(Default)]
pub enum PickChannel {
    #[default]
    NotConnected,
    Connected(Box<dyn PickLink>),
}

impl PickChannel {
    /// Wrap a live link.
    pub fn connect<L: PickLink + 'static>(link: L) -> Self {
        PickChannel::Connected(Box::new(link))
    }

    /// Whether a viewer is attached.
    pub fn is_connected(&self) -> bool {
        matches!(self, PickChannel::Connected(_))
    }

    /// Drop the link and go back to manual entry.
    pub fn disconnect(&mut self) {
        *self = PickChannel::NotConnected;
    }

    /// One request/response round. `None` when there is no viewer or it went away.
    pub fn request_point(&mut self) -> Option<WorldPoint> {
        let result = match self {
            PickChannel::NotConnected => return None,
            PickChannel::Connected(link) => exchange(link.as_mut()),
        };

        match result {
            Ok(point) => Some(point),
            Err(e) => {
                warn!(error = %e, "viewer channel lost");
                self.disconnect();
                None
            }
        }
    }
}

fn exchange(link: &mut dyn PickLink) -> Result<WorldPoint, PickError> {
    link.request()?;
    link.receive()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PickAnswer {
    Use,
    Again,
    Manual,
}

fn confirm_pick<O: Operator + ?Sized>(operator: &mut O, point: WorldPoint) -> Result<PickAnswer, GraphError> {
    let prompt = format!("Use {:.4}? [yes/no/manual] ", point);
    loop {
        match operator.ask(&prompt)?.to_ascii_lowercase().as_str() {
            "y" | "yes" => return Ok(PickAnswer::Use),
            "n" | "no" => return Ok(PickAnswer::Again),
            "m" | "manual" => return Ok(PickAnswer::Manual),
            _ => continue,
        }
    }
}

/// Get one point from the operator: a confirmed viewer click when a calibrated
/// floor and a live viewer are available, typed coordinates otherwise.
pub fn acquire_point<O: Operator + ?Sized>(
    channel: &mut PickChannel,
    context: &AuthoringContext,
    operator: &mut O,
    prompt: &str,
) -> Result<WorldPoint, GraphError> {
    if context.calibration().is_some() {
        while channel.is_connected() {
            operator.tell(&format!("{}(click the point in the viewer)", prompt))?;
            let Some(point) = channel.request_point() else {
                operator.tell("Viewer is not available, enter coordinates manually.")?;
                break;
            };
            match confirm_pick(operator, point)? {
                PickAnswer::Use => return Ok(point),
                PickAnswer::Again => continue,
                PickAnswer::Manual => break,
            }
        }
    }
    ask_coordinates(operator, prompt)
}

/// Viewer-side flag for the single outstanding request.
#[derive(Debug, Default)]
pub struct PendingSlot {
    pending: Mutex<bool>,
}

impl PendingSlot {
    /// Empty slot, nothing pending.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a request as pending. Repeated requests collapse into one.
    pub fn arm(&self) {
        *self.pending.lock() = true;
    }

    /// Clear the flag, returning whether a request was pending.
    pub fn take(&self) -> bool {
        std::mem::replace(&mut *self.pending.lock(), false)
    }

    /// Whether a request is waiting for a click.
    pub fn is_pending(&self) -> bool {
        *self.pending.lock()
    }
}

/// Read request tokens until the authoring side hangs up.
pub fn serve_requests<R: BufRead>(reader: R, slot: &PendingSlot) -> Result<(), PickError> {
    for line in reader.lines() {
        let line = line?;
        match line.trim() {
            REQUEST => {
                debug!("pick request pending");
                slot.arm();
            }
            "" => {}
            other => warn!(line = other, "ignoring unknown request"),
        }
    }
    info!("authoring session closed the channel");
    Ok(())
}

/// Viewer-side responder that turns clicks into replies.
///
/// Every click is echoed as `y, x` text the operator can paste into a
/// coordinate prompt, whether or not a request is pending.
pub struct PickResponder<'a, W, E> {
    slot: &'a PendingSlot,
    calibration: FloorCalibration,
    writer: W,
    echo: E,
}

impl<'a, W: Write, E: Write> PickResponder<'a, W, E> {
    /// Replies go to `writer`, the echo of each click to `echo`.
    pub fn new(slot: &'a PendingSlot, calibration: FloorCalibration, writer: W, echo: E) -> Self {
        Self {
            slot,
            calibration,
            writer,
            echo,
        }
    }

    /// Handle a pointer click; returns the world point if it answered a request.
    pub fn click(&mut self, pixel: PixelPoint) -> Result<Option<WorldPoint>, PickError> {
        let world = self.calibration.pixel_to_world(pixel);
        writeln!(self.echo, "{}", world)?;
        self.echo.flush()?;

        if !self.slot.take() {
            info!(px = pixel.x, py = pixel.y, "clicked {:.4} (no request pending)", world);
            return Ok(None);
        }

        writeln!(self.writer, "{}", encode_reply(world))?;
        self.writer.flush()?;
        info!(px = pixel.x, py = pixel.y, "sent {:.4}", world);
        Ok(Some(world))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Building;
    use crate::operator::ScriptedOperator;
    use std::cell::Cell;
    use std::collections::BTreeMap;
    use std::io::{self, Cursor};
    use std::rc::Rc;

    fn calibration() -> FloorCalibration {
        FloorCalibration {
            meters_per_pixel: 0.5,
            origin_pixel_x: 100,
            origin_pixel_y: 50,
        }
    }

    fn floor_context() -> AuthoringContext {
        let mut floors = BTreeMap::new();
        floors.insert(1, calibration());
        AuthoringContext::for_floor(
            &Building {
                name: "Hall".into(),
                node_id: 3,
                floors,
            },
            1,
        )
    }

    /// Replies with queued points, counting requests.
    struct FakeViewer {
        replies: Vec<WorldPoint>,
        requests: Rc<Cell<usize>>,
    }

    impl PickLink for FakeViewer {
        fn request(&mut self) -> Result<(), PickError> {
            self.requests.set(self.requests.get() + 1);
            Ok(())
        }

        fn receive(&mut self) -> Result<WorldPoint, PickError> {
            if self.replies.is_empty() {
                return Err(PickError::Closed);
            }
            Ok(self.replies.remove(0))
        }
    }

    #[test]
    fn test_reply_codec() {
        let p = WorldPoint::new(-12.5, 3.25);
        assert_eq!(decode_reply(&encode_reply(p)).unwrap(), p);
        assert!(decode_reply("point 1").is_err());
        assert!(decode_reply("hello 1 2").is_err());
    }

    #[test]
    fn test_stream_link_round() {
        let mut link = StreamLink::new(Cursor::new("point 4 5\n"), Vec::new());
        link.request().unwrap();
        assert_eq!(link.receive().unwrap(), WorldPoint::new(4.0, 5.0));
        assert_eq!(link.writer, b"pick\n");
    }

    #[test]
    fn test_closed_channel_falls_back_to_manual_entry() {
        let mut channel = PickChannel::connect(StreamLink::new(Cursor::new(""), Vec::new()));
        let mut op = ScriptedOperator::new(["1, 2"]);

        let p = acquire_point(&mut channel, &floor_context(), &mut op, "Start: ").unwrap();

        assert_eq!(p, WorldPoint::new(2.0, 1.0));
        assert!(!channel.is_connected());
        assert!(op.was_told("not available"));
    }

    #[test]
    fn test_not_connected_goes_straight_to_prompt() {
        let mut channel = PickChannel::NotConnected;
        let mut op = ScriptedOperator::new(["3, 4"]);

        let p = acquire_point(&mut channel, &floor_context(), &mut op, "Start: ").unwrap();

        assert_eq!(p, WorldPoint::new(4.0, 3.0));
        assert!(op.messages.is_empty());
    }

    #[test]
    fn test_global_context_never_requests() {
        let requests = Rc::new(Cell::new(0));
        let mut channel = PickChannel::connect(FakeViewer {
            replies: vec![WorldPoint::new(1.0, 1.0)],
            requests: requests.clone(),
        });
        let mut op = ScriptedOperator::new(["43.0, -80.0"]);

        acquire_point(&mut channel, &AuthoringContext::Global, &mut op, "Start: ").unwrap();

        assert_eq!(requests.get(), 0);
        assert!(channel.is_connected());
    }

    #[test]
    fn test_rejected_pick_is_requested_again() {
        let requests = Rc::new(Cell::new(0));
        let mut channel = PickChannel::connect(FakeViewer {
            replies: vec![WorldPoint::new(1.0, 1.0), WorldPoint::new(2.0, 3.0)],
            requests: requests.clone(),
        });
        let mut op = ScriptedOperator::new(["no", "", "yes"]);

        let p = acquire_point(&mut channel, &floor_context(), &mut op, "End: ").unwrap();

        assert_eq!(p, WorldPoint::new(2.0, 3.0));
        assert_eq!(requests.get(), 2);
        assert!(op.was_asked("Use 3.0000, 2.0000?"));
    }

    #[test]
    fn test_manual_answer_switches_to_typing() {
        let requests = Rc::new(Cell::new(0));
        let mut channel = PickChannel::connect(FakeViewer {
            replies: vec![WorldPoint::new(1.0, 1.0)],
            requests,
        });
        let mut op = ScriptedOperator::new(["manual", "7, 8"]);

        let p = acquire_point(&mut channel, &floor_context(), &mut op, "End: ").unwrap();

        assert_eq!(p, WorldPoint::new(8.0, 7.0));
        assert!(channel.is_connected());
    }

    #[test]
    fn test_serve_requests_arms_slot() {
        let slot = PendingSlot::new();
        serve_requests(Cursor::new("pick\npick\n"), &slot).unwrap();
        assert!(slot.is_pending());
        assert!(slot.take());
        assert!(!slot.take());
    }

    #[test]
    fn test_click_without_request_is_only_echoed() {
        let slot = PendingSlot::new();
        let mut out = Vec::new();
        let mut echo = Vec::new();
        let mut responder = PickResponder::new(&slot, calibration(), &mut out, &mut echo);

        assert_eq!(responder.click(PixelPoint::new(110, 40)).unwrap(), None);
        assert!(out.is_empty());
        assert_eq!(String::from_utf8(echo).unwrap(), "-5, 5\n");
    }

    #[test]
    fn test_echo_parses_as_typed_coordinates() {
        let slot = PendingSlot::new();
        let mut echo = Vec::new();
        let mut responder = PickResponder::new(&slot, calibration(), io::sink(), &mut echo);
        let clicked = PixelPoint::new(113, 27);
        let world = calibration().pixel_to_world(clicked);

        responder.click(clicked).unwrap();
        let text = String::from_utf8(echo).unwrap();
        assert_eq!(crate::transform::parse_coordinates(text.trim()).unwrap(), world);
    }

    #[test]
    fn test_click_answers_pending_request_once() {
        let slot = PendingSlot::new();
        slot.arm();
        let mut out = Vec::new();
        let mut echo = Vec::new();
        {
            let mut responder = PickResponder::new(&slot, calibration(), &mut out, &mut echo);
            let sent = responder.click(PixelPoint::new(110, 40)).unwrap();
            assert_eq!(sent, Some(WorldPoint::new(5.0, -5.0)));
            assert_eq!(responder.click(PixelPoint::new(120, 40)).unwrap(), None);
        }

        assert_eq!(String::from_utf8(out).unwrap(), "point 5 -5\n");
        assert_eq!(String::from_utf8(echo).unwrap(), "-5, 5\n-5, 10\n");
        assert!(!slot.is_pending());
    }

    #[test]
    fn test_snapshot_line() {
        let snapshot = Snapshot::default();
        let mut buf = Vec::new();
        snapshot.write_line(&mut buf).unwrap();
        assert_eq!(buf.last(), Some(&b'\n'));

        let back = Snapshot::read_line(&mut Cursor::new(buf)).unwrap();
        assert_eq!(back, snapshot);
    }
}
