//! Prefab descriptors (`.ppd`).
//!
//! A prefab descriptor starts with a version, one count per section and one
//! absolute offset per section. Sections are arrays of fixed-size records.
//! Version 24 appends a navigation node section.

use std::sync::LazyLock;

use scs_common::{BinaryReader, Diagnostics, Token};
use scs_struct::dsl::*;
use scs_struct::{Context, DecodeError, Layout, Record, Schema, Value};

use crate::{record, Error, Result};

/// Descriptor versions with a known layout.
pub const SUPPORTED_VERSIONS: [u32; 2] = [23, 24];

fn has_nav_nodes(ctx: &Context<'_>) -> bool {
    ctx.int("version").is_some_and(|v| v >= 24)
}

fn fixed<const N: usize>(r: &Record, name: &'static str) -> scs_struct::Result<[i32; N]> {
    r.i32s(name)?
        .try_into()
        .map_err(|_| DecodeError::type_mismatch(r.offset(), name, "an i32 array of the declared length"))
}

/// A point where the prefab connects to a road or another prefab.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PrefabNode {
    pub terrain_point_index: u32,
    pub terrain_point_count: u32,
    pub variant_index: u32,
    pub variant_count: u32,
    pub position: [f32; 3],
    pub direction: [f32; 3],
    /// Navigation curve indices entering the prefab, `-1` when unused.
    pub input_lanes: [i32; 8],
    /// Navigation curve indices leaving the prefab, `-1` when unused.
    pub output_lanes: [i32; 8],
}

impl PrefabNode {
    pub const SIZE: usize = 104;
}

impl Schema for PrefabNode {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("terrain_point_index", u32()),
                field("terrain_point_count", u32()),
                field("variant_index", u32()),
                field("variant_count", u32()),
                field("position", floats(3)),
                field("direction", floats(3)),
                field("input_lanes", fixed_array(i32(), 8)),
                field("output_lanes", fixed_array(i32(), 8)),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        Ok(Self {
            terrain_point_index: r.u32("terrain_point_index")?,
            terrain_point_count: r.u32("terrain_point_count")?,
            variant_index: r.u32("variant_index")?,
            variant_count: r.u32("variant_count")?,
            position: r.floats("position")?,
            direction: r.floats("direction")?,
            input_lanes: fixed(r, "input_lanes")?,
            output_lanes: fixed(r, "output_lanes")?,
        })
    }
}

/// A lane through the prefab.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NavCurve {
    pub name: Token,
    pub flags: u32,
    /// Node the curve starts at, if it starts on the prefab boundary.
    pub start_node: u8,
    /// Node the curve ends at, if it ends on the prefab boundary.
    pub end_node: u8,
    pub start_position: [f32; 3],
    pub end_position: [f32; 3],
    pub start_rotation: [f32; 4],
    pub end_rotation: [f32; 4],
    pub length: f32,
    pub next_curves: Vec<i32>,
    pub prev_curves: Vec<i32>,
    pub semaphore_id: i32,
    pub traffic_rule: Token,
    pub nav_node_index: Option<u32>,
}

impl Schema for NavCurve {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("name", token()),
                field("flags", u32()),
                field("leads_to_nodes", u8()),
                field("start_position", floats(3)),
                field("end_position", floats(3)),
                field("start_rotation", floats(4)),
                field("end_rotation", floats(4)),
                field("length", f32()),
                field("next_lines", fixed_array(i32(), 4)),
                field("prev_lines", fixed_array(i32(), 4)),
                field("next_line_count", u32()),
                field("prev_line_count", u32()),
                field("semaphore_id", i32()),
                field("traffic_rule", token()),
                field("nav_node_index", optional(u32(), has_nav_nodes)),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        let leads_to = r.u8("leads_to_nodes")?;
        let mut next_curves = r.i32s("next_lines")?;
        next_curves.truncate(r.u32("next_line_count")? as usize);
        let mut prev_curves = r.i32s("prev_lines")?;
        prev_curves.truncate(r.u32("prev_line_count")? as usize);
        Ok(Self {
            name: r.token("name")?,
            flags: r.u32("flags")?,
            start_node: leads_to >> 4,
            end_node: leads_to & 0x0F,
            start_position: r.floats("start_position")?,
            end_position: r.floats("end_position")?,
            start_rotation: r.floats("start_rotation")?,
            end_rotation: r.floats("end_rotation")?,
            length: r.f32("length")?,
            next_curves,
            prev_curves,
            semaphore_id: r.i32("semaphore_id")?,
            traffic_rule: r.token("traffic_rule")?,
            nav_node_index: match r.optional("nav_node_index")? {
                Some(_) => Some(r.u32("nav_node_index")?),
                None => None,
            },
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sign {
    pub name: Token,
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub model: Token,
    pub part: Token,
}

impl Schema for Sign {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("name", token()),
                field("position", floats(3)),
                field("rotation", floats(4)),
                field("model", token()),
                field("part", token()),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        Ok(Self {
            name: r.token("name")?,
            position: r.floats("position")?,
            rotation: r.floats("rotation")?,
            model: r.token("model")?,
            part: r.token("part")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Semaphore {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub kind: u32,
    pub semaphore_id: u32,
    /// Green, orange, red and orange-before-green durations in seconds.
    pub intervals: [f32; 4],
    pub cycle_delay: f32,
    pub profile: Token,
}

impl Schema for Semaphore {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("position", floats(3)),
                field("rotation", floats(4)),
                field("kind", u32()),
                field("semaphore_id", u32()),
                field("intervals", floats(4)),
                field("cycle_delay", f32()),
                field("profile", token()),
                field("_reserved", reserved(u32(), 1)),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        Ok(Self {
            position: r.floats("position")?,
            rotation: r.floats("rotation")?,
            kind: r.u32("kind")?,
            semaphore_id: r.u32("semaphore_id")?,
            intervals: r.floats("intervals")?,
            cycle_delay: r.f32("cycle_delay")?,
            profile: r.token("profile")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SpawnPoint {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub kind: u32,
}

impl Schema for SpawnPoint {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("position", floats(3)),
                field("rotation", floats(4)),
                field("kind", u32()),
                field("_reserved", reserved(u32(), 1)),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        Ok(Self {
            position: r.floats("position")?,
            rotation: r.floats("rotation")?,
            kind: r.u32("kind")?,
        })
    }
}

/// A terrain vertex, assembled from the parallel position and normal sections.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TerrainPoint {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TerrainPointVariant {
    pub attach0: u32,
    pub attach1: u32,
}

impl Schema for TerrainPointVariant {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> =
            LazyLock::new(|| strukt(vec![field("attach0", u32()), field("attach1", u32())]));
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        Ok(Self {
            attach0: r.u32("attach0")?,
            attach1: r.u32("attach1")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TriggerPoint {
    pub trigger_id: u32,
    pub action: Token,
    pub range: f32,
    pub reset_delay: f32,
    pub reset_distance: f32,
    pub flags: u32,
    pub position: [f32; 3],
    pub neighbours: [i32; 2],
}

impl Schema for TriggerPoint {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("trigger_id", u32()),
                field("action", token()),
                field("range", f32()),
                field("reset_delay", f32()),
                field("reset_distance", f32()),
                field("flags", u32()),
                field("position", floats(3)),
                field("neighbours", fixed_array(i32(), 2)),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        Ok(Self {
            trigger_id: r.u32("trigger_id")?,
            action: r.token("action")?,
            range: r.f32("range")?,
            reset_delay: r.f32("reset_delay")?,
            reset_distance: r.f32("reset_distance")?,
            flags: r.u32("flags")?,
            position: r.floats("position")?,
            neighbours: fixed(r, "neighbours")?,
        })
    }
}

/// Where two navigation curves cross.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Intersection {
    pub curve_index: u32,
    /// Distance along the curve.
    pub position: f32,
    pub radius: f32,
    pub flags: u32,
}

impl Schema for Intersection {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("curve_index", u32()),
                field("position", f32()),
                field("radius", f32()),
                field("flags", u32()),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        Ok(Self {
            curve_index: r.u32("curve_index")?,
            position: r.f32("position")?,
            radius: r.f32("radius")?,
            flags: r.u32("flags")?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum NavNodeKind {
    /// A prefab boundary node.
    Physical,
    /// An inner point on a navigation curve.
    Curve,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NavConnection {
    pub target: u16,
    pub length: f32,
    pub curve_indices: Vec<u16>,
}

/// A vertex of the prefab's navigation graph (version 24).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct NavNode {
    pub kind: NavNodeKind,
    pub index: u16,
    pub connections: Vec<NavConnection>,
}

impl Schema for NavNode {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            let connection = strukt(vec![
                field("target", u16()),
                field("length", f32()),
                field("curve_count", u8()),
                field("curve_indices", fixed_array(u16(), 8)),
            ]);
            strukt(vec![
                field("kind", u8()),
                field("index", u16()),
                field("connection_count", u8()),
                field("connections", fixed_array(connection, 4)),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        let kind = match r.u8("kind")? {
            0 => NavNodeKind::Physical,
            _ => NavNodeKind::Curve,
        };
        let used = r.u8("connection_count")? as usize;
        let connections = r
            .records("connections")?
            .into_iter()
            .take(used)
            .map(|c| -> scs_struct::Result<NavConnection> {
                let mut curve_indices: Vec<u16> = c
                    .u64s("curve_indices")?
                    .into_iter()
                    .map(|i| i as u16)
                    .collect();
                curve_indices.truncate(c.u8("curve_count")? as usize);
                Ok(NavConnection {
                    target: c.u16("target")?,
                    length: c.f32("length")?,
                    curve_indices,
                })
            })
            .collect::<scs_struct::Result<_>>()?;
        Ok(Self {
            kind,
            index: r.u16("index")?,
            connections,
        })
    }
}

/// Lane count on one side of a road map point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum LaneCount {
    Count(u8),
    /// Derived from the connected road.
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum PolygonColour {
    Light,
    Dark,
    Green,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct RoadPoint {
    pub lanes_left: LaneCount,
    pub lanes_right: LaneCount,
    /// Gap between the two directions, in metres.
    pub offset: f32,
    /// Drawn as two separated carriageways.
    pub split: bool,
}

/// How a map point is drawn on the in-game map.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum MapPointKind {
    Road(RoadPoint),
    Polygon { colour: PolygonColour },
}

/// A vertex of the prefab's map outline.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct MapPoint {
    pub position: [f32; 3],
    pub neighbours: Vec<i32>,
    pub visual_flags: u32,
    pub nav_flags: u32,
    pub road_over: bool,
    pub no_outline: bool,
    pub no_arrow: bool,
    pub prefab_exit: bool,
    pub kind: MapPointKind,
}

impl MapPoint {
    pub const SIZE: usize = 48;
}

/// Raw map point before its visual flags are interpreted.
struct RawMapPoint {
    visual_flags: u32,
    nav_flags: u32,
    position: [f32; 3],
    neighbours: Vec<i32>,
}

impl Schema for RawMapPoint {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("visual_flags", u32()),
                field("nav_flags", u32()),
                field("position", floats(3)),
                field("neighbours", fixed_array(i32(), 6)),
                field("neighbour_count", u32()),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        let mut neighbours = r.i32s("neighbours")?;
        neighbours.truncate(r.u32("neighbour_count")? as usize);
        Ok(Self {
            visual_flags: r.u32("visual_flags")?,
            nav_flags: r.u32("nav_flags")?,
            position: r.floats("position")?,
            neighbours,
        })
    }
}

mod visual {
    pub const ROAD_OVER: u32 = 0x0000_0001;
    pub const NO_OUTLINE: u32 = 0x0000_0002;
    pub const NO_ARROW: u32 = 0x0000_0004;
    pub const PREFAB_EXIT: u32 = 0x0000_0008;
    pub const COLOUR_SHIFT: u32 = 4;
    pub const ROAD_SIZE_SHIFT: u32 = 8;
    pub const OFFSET_SHIFT: u32 = 12;
    pub const CUSTOM_LANES_SHIFT: u32 = 16;

    pub const ROAD_SIZE_MANUAL: u32 = 0xD;
    pub const ROAD_SIZE_AUTO: u32 = 0xE;
    pub const ROAD_SIZE_POLYGON: u32 = 0xF;

    /// Offset nibble to metres.
    pub const OFFSETS: [f32; 8] = [0.0, 1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 25.0];
}

fn nibble(flags: u32, shift: u32) -> u32 {
    (flags >> shift) & 0xF
}

/// Lanes for a road size nibble: left, right, split.
fn road_lanes(size: u32, flags: u32) -> Option<(LaneCount, LaneCount, bool)> {
    use LaneCount::{Auto, Count};
    Some(match size {
        0 => (Count(1), Count(0), false),
        1 => (Count(1), Count(1), false),
        2 => (Count(2), Count(2), false),
        3 => (Count(3), Count(3), false),
        4 => (Count(4), Count(4), false),
        5 => (Count(2), Count(2), true),
        6 => (Count(3), Count(3), true),
        7 => (Count(4), Count(4), true),
        8 => (Count(3), Count(0), false),
        visual::ROAD_SIZE_MANUAL => {
            let lanes = (flags >> visual::CUSTOM_LANES_SHIFT) & 0xFF;
            (Count((lanes >> 4) as u8), Count((lanes & 0xF) as u8), false)
        }
        visual::ROAD_SIZE_AUTO => (Auto, Auto, false),
        _ => return None,
    })
}

fn polygon_colour(nibble: u32) -> Option<PolygonColour> {
    match nibble {
        0 => Some(PolygonColour::Light),
        1 => Some(PolygonColour::Dark),
        2 => Some(PolygonColour::Green),
        _ => None,
    }
}

/// Interpret a map point's visual flags, warning and falling back on unknown nibbles.
pub fn map_point_kind(flags: u32, index: usize, diagnostics: &mut Diagnostics) -> MapPointKind {
    let size = nibble(flags, visual::ROAD_SIZE_SHIFT);
    if size == visual::ROAD_SIZE_POLYGON {
        let raw = nibble(flags, visual::COLOUR_SHIFT);
        let colour = polygon_colour(raw).unwrap_or_else(|| {
            diagnostics.warn(format!(
                "map point {index}: unknown polygon colour {raw:#x}, using light"
            ));
            PolygonColour::Light
        });
        return MapPointKind::Polygon { colour };
    }

    let (lanes_left, lanes_right, split) = road_lanes(size, flags).unwrap_or_else(|| {
        diagnostics.warn(format!(
            "map point {index}: unknown road size {size:#x}, using 1/1 lanes"
        ));
        (LaneCount::Count(1), LaneCount::Count(1), false)
    });

    let raw = nibble(flags, visual::OFFSET_SHIFT);
    let offset = match visual::OFFSETS.get(raw as usize) {
        Some(&metres) => metres,
        None => {
            diagnostics.warn(format!(
                "map point {index}: unknown road offset {raw:#x}, using 0 m"
            ));
            0.0
        }
    };

    MapPointKind::Road(RoadPoint {
        lanes_left,
        lanes_right,
        offset,
        split,
    })
}

/// A decoded prefab descriptor.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PrefabDescription {
    pub version: u32,
    pub nodes: Vec<PrefabNode>,
    pub nav_curves: Vec<NavCurve>,
    pub signs: Vec<Sign>,
    pub semaphores: Vec<Semaphore>,
    pub spawn_points: Vec<SpawnPoint>,
    pub terrain_points: Vec<TerrainPoint>,
    pub terrain_point_variants: Vec<TerrainPointVariant>,
    pub map_points: Vec<MapPoint>,
    pub trigger_points: Vec<TriggerPoint>,
    pub intersections: Vec<Intersection>,
    pub nav_nodes: Vec<NavNode>,
}

const COUNTS: [&str; 11] = [
    "node_count",
    "nav_curve_count",
    "sign_count",
    "semaphore_count",
    "spawn_point_count",
    "terrain_point_count",
    "terrain_point_variant_count",
    "map_point_count",
    "trigger_point_count",
    "intersection_count",
    "nav_node_count",
];

const OFFSETS: [&str; 12] = [
    "node_offset",
    "nav_curve_offset",
    "sign_offset",
    "semaphore_offset",
    "spawn_point_offset",
    "terrain_point_pos_offset",
    "terrain_point_normal_offset",
    "terrain_point_variant_offset",
    "map_point_offset",
    "trigger_point_offset",
    "intersection_offset",
    "nav_node_offset",
];

fn section(offset: &'static str, element: &Layout, count: &'static str) -> Layout {
    pointer(offset, counted(element.clone(), count))
}

/// The whole descriptor.
pub fn layout() -> &'static Layout {
    static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
        let mut fields = vec![field("version", u32())];
        // nav nodes only exist from version 24 on, and they come last in both lists
        for name in COUNTS.into_iter().chain(OFFSETS) {
            let layout = if name.starts_with("nav_node") {
                optional(u32(), has_nav_nodes)
            } else {
                u32()
            };
            fields.push(field(name, layout));
        }

        let position = floats(3);
        fields.extend([
            field("nodes", section("node_offset", PrefabNode::layout(), "node_count")),
            field(
                "nav_curves",
                section("nav_curve_offset", NavCurve::layout(), "nav_curve_count"),
            ),
            field("signs", section("sign_offset", Sign::layout(), "sign_count")),
            field(
                "semaphores",
                section("semaphore_offset", Semaphore::layout(), "semaphore_count"),
            ),
            field(
                "spawn_points",
                section("spawn_point_offset", SpawnPoint::layout(), "spawn_point_count"),
            ),
            field(
                "terrain_positions",
                section("terrain_point_pos_offset", &position, "terrain_point_count"),
            ),
            field(
                "terrain_normals",
                section("terrain_point_normal_offset", &position, "terrain_point_count"),
            ),
            field(
                "terrain_point_variants",
                section(
                    "terrain_point_variant_offset",
                    TerrainPointVariant::layout(),
                    "terrain_point_variant_count",
                ),
            ),
            field(
                "map_points",
                section("map_point_offset", RawMapPoint::layout(), "map_point_count"),
            ),
            field(
                "trigger_points",
                section("trigger_point_offset", TriggerPoint::layout(), "trigger_point_count"),
            ),
            field(
                "intersections",
                section("intersection_offset", Intersection::layout(), "intersection_count"),
            ),
            field(
                "nav_nodes",
                optional(
                    section("nav_node_offset", NavNode::layout(), "nav_node_count"),
                    has_nav_nodes,
                ),
            ),
        ]);
        strukt(fields)
    });
    &LAYOUT
}

fn each<T: Schema>(r: &Record, name: &'static str) -> scs_struct::Result<Vec<T>> {
    r.array(name)?.iter().map(T::from_value).collect()
}

fn vectors(r: &Record, name: &'static str) -> scs_struct::Result<Vec<[f32; 3]>> {
    r.array(name)?
        .iter()
        .map(|v| -> scs_struct::Result<[f32; 3]> {
            let items = v
                .as_array()
                .filter(|items| items.len() == 3)
                .ok_or_else(|| DecodeError::type_mismatch(r.offset(), name, "a float triple"))?;
            let mut out = [0f32; 3];
            for (slot, item) in out.iter_mut().zip(items) {
                *slot = item
                    .as_f64()
                    .ok_or_else(|| DecodeError::type_mismatch(r.offset(), name, "a float"))?
                    as f32;
            }
            Ok(out)
        })
        .collect()
}

impl PrefabDescription {
    /// Decode a `.ppd` buffer. Unknown map point nibbles are reported to `diagnostics`.
    pub fn parse(data: &[u8], diagnostics: &mut Diagnostics) -> Result<Self> {
        let version = BinaryReader::new(data).read_u32()?;
        if !SUPPORTED_VERSIONS.contains(&version) {
            return Err(Error::UnsupportedVersion {
                format: "prefab",
                version,
            });
        }

        let value = scs_struct::decode(layout(), data)?;
        let r = record(&value)?;

        let terrain_points = vectors(r, "terrain_positions")?
            .into_iter()
            .zip(vectors(r, "terrain_normals")?)
            .map(|(position, normal)| TerrainPoint { position, normal })
            .collect();

        let map_points = each::<RawMapPoint>(r, "map_points")?
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let flags = raw.visual_flags;
                MapPoint {
                    kind: map_point_kind(flags, index, diagnostics),
                    position: raw.position,
                    neighbours: raw.neighbours,
                    visual_flags: flags,
                    nav_flags: raw.nav_flags,
                    road_over: flags & visual::ROAD_OVER != 0,
                    no_outline: flags & visual::NO_OUTLINE != 0,
                    no_arrow: flags & visual::NO_ARROW != 0,
                    prefab_exit: flags & visual::PREFAB_EXIT != 0,
                }
            })
            .collect();

        let nav_nodes = match r.optional("nav_nodes")? {
            Some(_) => each(r, "nav_nodes")?,
            None => Vec::new(),
        };

        let prefab = Self {
            version,
            nodes: each(r, "nodes")?,
            nav_curves: each(r, "nav_curves")?,
            signs: each(r, "signs")?,
            semaphores: each(r, "semaphores")?,
            spawn_points: each(r, "spawn_points")?,
            terrain_points,
            terrain_point_variants: each(r, "terrain_point_variants")?,
            map_points,
            trigger_points: each(r, "trigger_points")?,
            intersections: each(r, "intersections")?,
            nav_nodes,
        };
        tracing::debug!(
            version,
            nodes = prefab.nodes.len(),
            curves = prefab.nav_curves.len(),
            map_points = prefab.map_points.len(),
            "decoded prefab"
        );
        Ok(prefab)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER_V24: usize = 4 + 11 * 4 + 12 * 4;
    const HEADER_V23: usize = 4 + 10 * 4 + 11 * 4;

    fn node_bytes() -> Vec<u8> {
        let mut out = Vec::new();
        for v in [0u32, 0, 0, 0] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for v in [1.0f32, 2.0, 3.0, 0.0, 0.0, 1.0] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for lane in [0i32, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1, -1] {
            out.extend_from_slice(&lane.to_le_bytes());
        }
        out
    }

    fn map_point_bytes(visual_flags: u32) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&visual_flags.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        for v in [10.0f32, 0.0, -4.0] {
            out.extend_from_slice(&v.to_le_bytes());
        }
        for n in [0i32, -1, -1, -1, -1, -1] {
            out.extend_from_slice(&n.to_le_bytes());
        }
        out.extend_from_slice(&1u32.to_le_bytes());
        out
    }

    /// One node and one map point, every other section empty.
    fn prefab_bytes(version: u32, visual_flags: u32) -> Vec<u8> {
        let v24 = version >= 24;
        let header = if v24 { HEADER_V24 } else { HEADER_V23 };
        let node_offset = header as u32;
        let map_offset = node_offset + PrefabNode::SIZE as u32;
        let end = map_offset + MapPoint::SIZE as u32;

        let mut counts = vec![1u32, 0, 0, 0, 0, 0, 0, 1, 0, 0];
        let mut offsets = vec![node_offset, end, end, end, end, end, end, end, map_offset, end, end];
        if v24 {
            counts.push(0);
            offsets.push(end);
        }

        let mut out = version.to_le_bytes().to_vec();
        for v in counts.into_iter().chain(offsets) {
            out.extend_from_slice(&v.to_le_bytes());
        }
        assert_eq!(out.len(), header);
        out.extend(node_bytes());
        out.extend(map_point_bytes(visual_flags));
        out
    }

    #[test]
    fn test_layout_sizes() {
        assert_eq!(PrefabNode::layout().fixed_size(), Some(PrefabNode::SIZE));
        assert_eq!(RawMapPoint::layout().fixed_size(), Some(MapPoint::SIZE));
        assert_eq!(NavNode::layout().fixed_size(), Some(96));
    }

    #[test]
    fn test_v24_road_map_point() {
        let data = prefab_bytes(24, 0x200);
        let mut diagnostics = Diagnostics::new();
        let prefab = PrefabDescription::parse(&data, &mut diagnostics).unwrap();

        assert!(diagnostics.is_empty());
        assert_eq!(prefab.version, 24);
        assert_eq!(prefab.nodes.len(), 1);
        assert_eq!(prefab.nodes[0].position, [1.0, 2.0, 3.0]);
        assert_eq!(prefab.nodes[0].input_lanes[0], 0);
        assert!(prefab.nav_curves.is_empty());
        assert!(prefab.nav_nodes.is_empty());

        let point = &prefab.map_points[0];
        assert_eq!(point.position, [10.0, 0.0, -4.0]);
        assert_eq!(point.neighbours, [0]);
        assert_eq!(
            point.kind,
            MapPointKind::Road(RoadPoint {
                lanes_left: LaneCount::Count(2),
                lanes_right: LaneCount::Count(2),
                offset: 0.0,
                split: false,
            })
        );
    }

    #[test]
    fn test_v23_has_no_nav_node_section() {
        let data = prefab_bytes(23, 0x1 | 0x300 | 0x3000);
        let mut diagnostics = Diagnostics::new();
        let prefab = PrefabDescription::parse(&data, &mut diagnostics).unwrap();

        let point = &prefab.map_points[0];
        assert!(point.road_over);
        assert_eq!(
            point.kind,
            MapPointKind::Road(RoadPoint {
                lanes_left: LaneCount::Count(3),
                lanes_right: LaneCount::Count(3),
                offset: 5.0,
                split: false,
            })
        );
    }

    #[test]
    fn test_unknown_version() {
        let mut data = prefab_bytes(24, 0);
        data[..4].copy_from_slice(&22u32.to_le_bytes());
        let err = PrefabDescription::parse(&data, &mut Diagnostics::new()).unwrap_err();
        assert!(matches!(
            err,
            Error::UnsupportedVersion {
                format: "prefab",
                version: 22
            }
        ));
    }

    #[test]
    fn test_section_offset_out_of_bounds() {
        let mut data = prefab_bytes(24, 0);
        // node_offset
        data[48..52].copy_from_slice(&10_000u32.to_le_bytes());
        let err = PrefabDescription::parse(&data, &mut Diagnostics::new()).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_manual_and_auto_lanes() {
        let mut diagnostics = Diagnostics::new();
        let manual = map_point_kind(0x0032_0D00, 0, &mut diagnostics);
        assert_eq!(
            manual,
            MapPointKind::Road(RoadPoint {
                lanes_left: LaneCount::Count(3),
                lanes_right: LaneCount::Count(2),
                offset: 0.0,
                split: false,
            })
        );
        let auto = map_point_kind(0x0E00 | 0x7000, 1, &mut diagnostics);
        assert_eq!(
            auto,
            MapPointKind::Road(RoadPoint {
                lanes_left: LaneCount::Auto,
                lanes_right: LaneCount::Auto,
                offset: 25.0,
                split: false,
            })
        );
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_polygon_colour() {
        let mut diagnostics = Diagnostics::new();
        assert_eq!(
            map_point_kind(0x0F20, 0, &mut diagnostics),
            MapPointKind::Polygon {
                colour: PolygonColour::Green
            }
        );
        assert_eq!(
            map_point_kind(0x0F90, 3, &mut diagnostics),
            MapPointKind::Polygon {
                colour: PolygonColour::Light
            }
        );
        assert_eq!(diagnostics.warnings().count(), 1);
    }

    #[test]
    fn test_unknown_nibbles_fall_back_with_warnings() {
        let data = prefab_bytes(24, 0x0A00 | 0x9000);
        let mut diagnostics = Diagnostics::new();
        let prefab = PrefabDescription::parse(&data, &mut diagnostics).unwrap();

        assert_eq!(
            prefab.map_points[0].kind,
            MapPointKind::Road(RoadPoint {
                lanes_left: LaneCount::Count(1),
                lanes_right: LaneCount::Count(1),
                offset: 0.0,
                split: false,
            })
        );
        let messages: Vec<&str> = diagnostics
            .warnings()
            .map(|d| d.message.as_str())
            .collect();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("road size 0xa"));
        assert!(messages[1].contains("road offset 0x9"));
    }
}
