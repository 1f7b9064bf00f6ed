//! Hand-landmark geometry and shape classification.
//!
//! Landmarks follow the common 21-point hand skeleton layout, in image
//! pixels with `y` growing downward:
//!
//! ```text
//!  0 wrist
//!  1–4   thumb   (CMC, MCP, IP, tip)
//!  5–8   index   (MCP, PIP, DIP, tip)
//!  9–12  middle
//! 13–16  ring
//! 17–20  pinky
//! ```
//!
//! The rules are purely geometric so any landmark producer (camera model,
//! LeapMotion projection, synthetic frames) classifies the same way.

// ════════════════════════════════════════════════════════════════════════════
// Points and indices
// ════════════════════════════════════════════════════════════════════════════

/// A 2-D landmark in image pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self { Point { x, y } }

    pub fn distance(&self, other: &Point) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

pub const LANDMARK_COUNT: usize = 21;

pub const WRIST:     usize = 0;
pub const THUMB_IP:  usize = 3;
pub const THUMB_TIP: usize = 4;
pub const INDEX_TIP: usize = 8;

/// The four non-thumb fingers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Finger {
    Index,
    Middle,
    Ring,
    Pinky,
}

impl Finger {
    pub const ALL: [Finger; 4] = [Finger::Index, Finger::Middle, Finger::Ring, Finger::Pinky];

    /// Landmark index of the fingertip.
    pub fn tip(self) -> usize {
        match self {
            Finger::Index  => 8,
            Finger::Middle => 12,
            Finger::Ring   => 16,
            Finger::Pinky  => 20,
        }
    }

    /// Middle joint (DIP), one below the tip.
    pub fn dip(self) -> usize { self.tip() - 1 }

    /// Base joint (PIP), two below the tip.
    pub fn pip(self) -> usize { self.tip() - 2 }
}

// ════════════════════════════════════════════════════════════════════════════
// HandLandmarks
// ════════════════════════════════════════════════════════════════════════════

/// One detected hand.
#[derive(Clone, Debug, PartialEq)]
pub struct HandLandmarks {
    points: [Point; LANDMARK_COUNT],
}

impl HandLandmarks {
    pub fn new(points: [Point; LANDMARK_COUNT]) -> Self { HandLandmarks { points } }

    /// Build from a slice, `None` unless exactly 21 points are given.
    pub fn from_slice(points: &[Point]) -> Option<Self> {
        let points: [Point; LANDMARK_COUNT] = points.try_into().ok()?;
        Some(HandLandmarks { points })
    }

    /// Build from normalised `[0, 1]` coordinates scaled to a frame.
    pub fn from_normalized(points: &[(f32, f32)], width: f32, height: f32) -> Option<Self> {
        let scaled: Vec<Point> = points.iter()
            .map(|&(x, y)| Point::new(x * width, y * height))
            .collect();
        Self::from_slice(&scaled)
    }

    pub fn point(&self, index: usize) -> Point { self.points[index] }

    /// A finger is extended when its tip is above (numerically less than)
    /// both its middle and base joints.
    pub fn finger_extended(&self, finger: Finger) -> bool {
        let tip = self.points[finger.tip()].y;
        tip < self.points[finger.dip()].y && tip < self.points[finger.pip()].y
    }

    /// The thumb extends sideways: compare the tip against its own base
    /// joint horizontally.  Frames are expected mirrored (selfie view).
    pub fn thumb_extended(&self) -> bool {
        self.points[THUMB_TIP].x > self.points[THUMB_IP].x
    }

    /// Number of extended digits, thumb included (0–5).
    pub fn extended_count(&self) -> usize {
        let fingers = Finger::ALL.iter().filter(|&&f| self.finger_extended(f)).count();
        fingers + usize::from(self.thumb_extended())
    }

    /// Thumb-tip to index-tip distance in pixels.
    pub fn pinch_distance(&self) -> f32 {
        self.points[THUMB_TIP].distance(&self.points[INDEX_TIP])
    }

    /// Thumb and index pinched, middle, ring and pinky extended.
    pub fn is_ok_sign(&self, pinch_threshold_px: f32) -> bool {
        self.pinch_distance() < pinch_threshold_px
            && self.finger_extended(Finger::Middle)
            && self.finger_extended(Finger::Ring)
            && self.finger_extended(Finger::Pinky)
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Shape
// ════════════════════════════════════════════════════════════════════════════

/// Closed set of per-frame classifications.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    Fist,
    Palm,
    OkSign,
    Other,
    /// No hand in the frame.
    None,
}

impl Shape {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fist   => "fist",
            Self::Palm   => "palm",
            Self::OkSign => "ok",
            Self::Other  => "other",
            Self::None   => "none",
        }
    }
}

/// Classify one hand.  The OK-sign takes precedence over the finger count;
/// otherwise zero extended digits is a fist and five is a palm.
pub fn classify(hand: &HandLandmarks, pinch_threshold_px: f32) -> Shape {
    if hand.is_ok_sign(pinch_threshold_px) {
        return Shape::OkSign;
    }
    match hand.extended_count() {
        0 => Shape::Fist,
        5 => Shape::Palm,
        _ => Shape::Other,
    }
}

/// Classify an optional frame; a frame without a hand is [`Shape::None`].
pub fn classify_frame(hand: Option<&HandLandmarks>, pinch_threshold_px: f32) -> Shape {
    hand.map_or(Shape::None, |h| classify(h, pinch_threshold_px))
}

// ════════════════════════════════════════════════════════════════════════════
// Tests
// ════════════════════════════════════════════════════════════════════════════
