use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::constants::{COLOR_BLUE, COLOR_GREEN, COLOR_RED, COLOR_WHITE, COLOR_YELLOW};

/// Marker as it appears in the analysis service's JSON.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MarkerWire {
    /// Shape vocabulary name (e.g., "hand_gesture", "arrow")
    #[serde(rename = "type")]
    pub kind: String,
    /// Horizontal position, percent of viewport width
    #[serde(default, deserialize_with = "null_as_default")]
    pub x: f32,
    /// Vertical position, percent of viewport height
    #[serde(default, deserialize_with = "null_as_default")]
    pub y: f32,
    /// Palette name
    #[serde(default, deserialize_with = "null_as_default")]
    pub color: String,
    /// Optional label; doubles as the action selector for hand gestures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Static rotation in degrees
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rotation: Option<f32>,
    /// Bounding box as [yMin, xMin, yMax, xMax], percent of viewport. Any
    /// other length is ignored at ingestion.
    #[serde(
        default,
        rename = "box_2d",
        alias = "box2d",
        skip_serializing_if = "Option::is_none"
    )]
    pub box_2d: Option<Vec<f32>>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Normalized position, both axes in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Anchor {
    pub x: f32,
    pub y: f32,
}

impl Anchor {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Clamp both coordinates into the normalized range.
    pub fn clamped(self) -> Self {
        Self {
            x: clamp_percent(self.x),
            y: clamp_percent(self.y),
        }
    }
}

/// Normalized bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extent {
    pub y_min: f32,
    pub x_min: f32,
    pub y_max: f32,
    pub x_max: f32,
}

impl Extent {
    /// `None` unless `raw` holds exactly four values.
    pub fn from_box_2d(raw: &[f32]) -> Option<Self> {
        let [y_min, x_min, y_max, x_max] = raw else {
            return None;
        };
        Some(Self {
            y_min: *y_min,
            x_min: *x_min,
            y_max: *y_max,
            x_max: *x_max,
        })
    }

    /// Clamp to the normalized range and order each axis min <= max.
    pub fn normalized(self) -> Self {
        let (x_min, x_max) = ordered(clamp_percent(self.x_min), clamp_percent(self.x_max));
        let (y_min, y_max) = ordered(clamp_percent(self.y_min), clamp_percent(self.y_max));
        Self {
            y_min,
            x_min,
            y_max,
            x_max,
        }
    }

    pub fn width(&self) -> f32 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f32 {
        self.y_max - self.y_min
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerColor {
    Red,
    Green,
    Blue,
    Yellow,
    /// Fallback for anything outside the palette
    White,
}

impl MarkerColor {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "red" => MarkerColor::Red,
            "green" => MarkerColor::Green,
            "blue" => MarkerColor::Blue,
            "yellow" => MarkerColor::Yellow,
            _ => MarkerColor::White,
        }
    }

    pub fn rgb(self) -> [u8; 3] {
        match self {
            MarkerColor::Red => COLOR_RED,
            MarkerColor::Green => COLOR_GREEN,
            MarkerColor::Blue => COLOR_BLUE,
            MarkerColor::Yellow => COLOR_YELLOW,
            MarkerColor::White => COLOR_WHITE,
        }
    }
}

/// What a hand marker should act out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandAction {
    Push,
    Rotate,
    Pull,
    Press,
    Connect,
    Idle,
}

/// Substrings matched against the uppercased label, checked in order.
/// The service answers in Portuguese as often as English.
const ACTION_KEYWORDS: &[(HandAction, &[&str])] = &[
    (HandAction::Push, &["PUSH", "EMPURR"]),
    (HandAction::Rotate, &["ROTAT", "GIRA", "GIRE"]),
    (HandAction::Pull, &["PULL", "PUXA", "PUXE"]),
    (HandAction::Press, &["PRESS", "APERT"]),
    (HandAction::Connect, &["CONNECT", "CONECT", "ENCAIX"]),
];

impl HandAction {
    pub fn from_label(label: Option<&str>) -> Self {
        let Some(label) = label else {
            return HandAction::Idle;
        };
        let upper = label.to_uppercase();
        ACTION_KEYWORDS
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|keyword| upper.contains(keyword)))
            .map(|(action, _)| *action)
            .unwrap_or(HandAction::Idle)
    }
}

/// Closed set of drawable marker shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerShape {
    HandGesture { action: HandAction },
    DirectionalArrow,
    ExplodedView,
    GlowZone,
    Circle,
    Rectangle,
    /// Unrecognized type that still carries a label; only the text is drawn
    LabelOnly,
}

impl MarkerShape {
    /// Resolve a wire `type` name. Returns `None` for names outside the vocabulary.
    pub fn parse(kind: &str, label: Option<&str>) -> Option<Self> {
        let shape = match kind.trim().to_ascii_lowercase().as_str() {
            "hand_gesture" | "ghost_hand" | "hand" => MarkerShape::HandGesture {
                action: HandAction::from_label(label),
            },
            "directional_arrow" | "arrow" => MarkerShape::DirectionalArrow,
            "exploded_view" | "3d_object" => MarkerShape::ExplodedView,
            "glow_zone" | "glow_ring" => MarkerShape::GlowZone,
            "circle" => MarkerShape::Circle,
            "rectangle" | "rect" => MarkerShape::Rectangle,
            _ => return None,
        };
        Some(shape)
    }

    pub fn name(&self) -> &'static str {
        match self {
            MarkerShape::HandGesture { .. } => "hand_gesture",
            MarkerShape::DirectionalArrow => "directional_arrow",
            MarkerShape::ExplodedView => "exploded_view",
            MarkerShape::GlowZone => "glow_zone",
            MarkerShape::Circle => "circle",
            MarkerShape::Rectangle => "rectangle",
            MarkerShape::LabelOnly => "label",
        }
    }
}

/// One AR annotation, validated at ingestion.
#[derive(Debug, Clone, PartialEq)]
pub struct Marker {
    pub shape: MarkerShape,
    pub anchor: Anchor,
    pub extent: Option<Extent>,
    pub color: MarkerColor,
    pub label: Option<String>,
    /// Static rotation applied before any animated rotation
    pub rotation_deg: f32,
}

impl Marker {
    pub fn new(shape: MarkerShape, anchor: Anchor) -> Self {
        Self {
            shape,
            anchor: anchor.clamped(),
            extent: None,
            color: MarkerColor::White,
            label: None,
            rotation_deg: 0.0,
        }
    }

    pub fn with_color(mut self, color: MarkerColor) -> Self {
        self.color = color;
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        if let MarkerShape::HandGesture { action } = &mut self.shape {
            *action = HandAction::from_label(Some(&label));
        }
        self.label = Some(label);
        self
    }

    pub fn with_extent(mut self, extent: Extent) -> Self {
        self.extent = Some(extent.normalized());
        self
    }

    pub fn with_rotation(mut self, rotation_deg: f32) -> Self {
        self.rotation_deg = finite_or(rotation_deg, 0.0);
        self
    }

    /// Convert a wire marker, clamping coordinates into range. An unknown
    /// type keeps its label as a [`MarkerShape::LabelOnly`] marker and is
    /// dropped when it has none.
    pub fn from_wire(wire: &MarkerWire) -> Option<Self> {
        let label = wire
            .label
            .as_deref()
            .map(str::trim)
            .filter(|label| !label.is_empty());
        let shape = match MarkerShape::parse(&wire.kind, label) {
            Some(shape) => shape,
            None if label.is_some() => {
                log::warn!("Unknown overlay type {:?}; drawing its label only", wire.kind);
                MarkerShape::LabelOnly
            }
            None => return None,
        };
        let anchor = Anchor::new(wire.x, wire.y);
        let clamped = anchor.clamped();
        if clamped != anchor {
            log::debug!(
                "Clamped {} anchor ({}, {}) to ({}, {})",
                shape.name(),
                wire.x,
                wire.y,
                clamped.x,
                clamped.y
            );
        }

        let extent = wire.box_2d.as_deref().and_then(|raw| {
            let extent = Extent::from_box_2d(raw);
            if extent.is_none() {
                log::warn!(
                    "Ignoring {} box_2d with {} value(s), expected 4",
                    shape.name(),
                    raw.len()
                );
            }
            extent.map(Extent::normalized)
        });

        Some(Self {
            shape,
            anchor: clamped,
            extent,
            color: MarkerColor::parse(&wire.color),
            label: label.map(str::to_string),
            rotation_deg: finite_or(wire.rotation.unwrap_or(0.0), 0.0),
        })
    }
}

/// Opaque identity of one marker list. Two lists with equal content still
/// have different ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerListId(Uuid);

impl MarkerListId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

/// All markers of the current analysis result.
#[derive(Debug, Clone)]
pub struct MarkerList {
    id: MarkerListId,
    markers: Vec<Marker>,
}

impl MarkerList {
    pub fn new(markers: Vec<Marker>) -> Self {
        Self {
            id: MarkerListId::new(),
            markers,
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    /// Ingest wire markers. Unknown shape names without a label are dropped.
    pub fn from_wire(wires: &[MarkerWire]) -> Self {
        let mut markers = Vec::with_capacity(wires.len());
        for wire in wires {
            match Marker::from_wire(wire) {
                Some(marker) => markers.push(marker),
                None => log::warn!("Dropping unlabeled overlay with unknown type {:?}", wire.kind),
            }
        }
        Self::new(markers)
    }

    pub fn id(&self) -> MarkerListId {
        self.id
    }

    pub fn markers(&self) -> &[Marker] {
        &self.markers
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }
}

fn clamp_percent(value: f32) -> f32 {
    finite_or(value, 0.0).clamp(0.0, 100.0)
}

fn finite_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

fn ordered(a: f32, b: f32) -> (f32, f32) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wire(kind: &str, x: f32, y: f32) -> MarkerWire {
        MarkerWire {
            kind: kind.to_string(),
            x,
            y,
            color: "red".to_string(),
            label: None,
            rotation: None,
            box_2d: None,
        }
    }

    #[test]
    fn test_action_matching_is_case_insensitive_substring() {
        assert_eq!(HandAction::from_label(Some("push the lever")), HandAction::Push);
        assert_eq!(HandAction::from_label(Some("Rotate valve")), HandAction::Rotate);
        assert_eq!(HandAction::from_label(Some("GIRAR")), HandAction::Rotate);
        assert_eq!(HandAction::from_label(Some("pull")), HandAction::Pull);
        assert_eq!(HandAction::from_label(Some("press button")), HandAction::Press);
        assert_eq!(HandAction::from_label(Some("connect cable")), HandAction::Connect);
    }

    #[test]
    fn test_unmatched_label_is_idle() {
        assert_eq!(HandAction::from_label(Some("look here")), HandAction::Idle);
        assert_eq!(HandAction::from_label(Some("TURN OFF BREAKER")), HandAction::Idle);
        assert_eq!(HandAction::from_label(Some("return spring")), HandAction::Idle);
        assert_eq!(HandAction::from_label(None), HandAction::Idle);
    }

    #[test]
    fn test_shape_aliases() {
        assert!(matches!(
            MarkerShape::parse("ghost_hand", Some("ROTATE")),
            Some(MarkerShape::HandGesture {
                action: HandAction::Rotate
            })
        ));
        assert_eq!(MarkerShape::parse("arrow", None), Some(MarkerShape::DirectionalArrow));
        assert_eq!(MarkerShape::parse("3d_object", None), Some(MarkerShape::ExplodedView));
        assert_eq!(MarkerShape::parse("GLOW_RING", None), Some(MarkerShape::GlowZone));
        assert_eq!(MarkerShape::parse("rect", None), Some(MarkerShape::Rectangle));
        assert_eq!(MarkerShape::parse("hexagon", None), None);
    }

    #[test]
    fn test_unknown_color_falls_back_to_white() {
        assert_eq!(MarkerColor::parse("purple"), MarkerColor::White);
        assert_eq!(MarkerColor::parse(" Yellow "), MarkerColor::Yellow);
        assert_eq!(MarkerColor::White.rgb(), COLOR_WHITE);
    }

    #[test]
    fn test_from_wire_clamps_anchor_and_orders_extent() {
        let mut raw = wire("circle", 140.0, -5.0);
        raw.box_2d = Some(vec![60.0, 80.0, 20.0, 120.0]);
        let marker = Marker::from_wire(&raw).unwrap();
        assert_eq!(marker.anchor, Anchor::new(100.0, 0.0));
        let extent = marker.extent.unwrap();
        assert_eq!(extent.y_min, 20.0);
        assert_eq!(extent.y_max, 60.0);
        assert_eq!(extent.x_min, 80.0);
        assert_eq!(extent.x_max, 100.0);
    }

    #[test]
    fn test_non_finite_values_are_neutralised() {
        let mut raw = wire("rect", f32::NAN, 50.0);
        raw.rotation = Some(f32::INFINITY);
        let marker = Marker::from_wire(&raw).unwrap();
        assert_eq!(marker.anchor.x, 0.0);
        assert_eq!(marker.rotation_deg, 0.0);
    }

    #[test]
    fn test_list_drops_unknown_kinds() {
        let list = MarkerList::from_wire(&[wire("circle", 10.0, 10.0), wire("blob", 5.0, 5.0)]);
        assert_eq!(list.len(), 1);
    }

    #[test]
    fn test_unknown_kind_with_label_keeps_text() {
        let mut raw = wire("blob", 5.0, 5.0);
        raw.label = Some("Main valve".to_string());
        let marker = Marker::from_wire(&raw).unwrap();
        assert_eq!(marker.shape, MarkerShape::LabelOnly);
        assert_eq!(marker.label.as_deref(), Some("Main valve"));
    }

    #[test]
    fn test_box_with_wrong_length_is_ignored() {
        let mut raw = wire("rect", 50.0, 50.0);
        raw.box_2d = Some(vec![10.0, 20.0, 30.0]);
        let marker = Marker::from_wire(&raw).unwrap();
        assert_eq!(marker.extent, None);
        assert_eq!(marker.anchor, Anchor::new(50.0, 50.0));

        raw.box_2d = Some(Vec::new());
        assert_eq!(Marker::from_wire(&raw).unwrap().extent, None);
    }

    #[test]
    fn test_null_fields_take_defaults() {
        let json = r#"{"type":"circle","x":null,"y":25,"color":null}"#;
        let raw: MarkerWire = serde_json::from_str(json).unwrap();
        assert_eq!(raw.x, 0.0);
        assert_eq!(raw.y, 25.0);
        let marker = Marker::from_wire(&raw).unwrap();
        assert_eq!(marker.color, MarkerColor::White);
    }

    #[test]
    fn test_equal_lists_have_distinct_ids() {
        let a = MarkerList::new(vec![Marker::new(MarkerShape::Circle, Anchor::new(1.0, 1.0))]);
        let b = MarkerList::new(a.markers().to_vec());
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_wire_parses_service_json() {
        let json = r#"{"type":"ghost_hand","x":30,"y":40,"color":"blue","label":"GIRAR","box_2d":[10,20,30,40]}"#;
        let raw: MarkerWire = serde_json::from_str(json).unwrap();
        assert_eq!(raw.box_2d, Some(vec![10.0, 20.0, 30.0, 40.0]));
        let marker = Marker::from_wire(&raw).unwrap();
        assert_eq!(
            marker.shape,
            MarkerShape::HandGesture {
                action: HandAction::Rotate
            }
        );
        assert_eq!(marker.color, MarkerColor::Blue);
    }
}
