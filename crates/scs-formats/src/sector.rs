//! Map sectors (`.base`).
//!
//! ```text
//! version | game id | items[] | nodes[] | visibility area children[]
//! ```
//!
//! Every item starts with a u32 type tag followed by a shared header (uid,
//! flags, view distance); the rest of the record depends on the type.
//! Compounds and visibility areas carry their own items and nodes, so the
//! item layout refers back to itself.

use std::sync::LazyLock;

use scs_common::Token;
use scs_struct::dsl::*;
use scs_struct::{DecodeError, Layout, Prim, Record, Schema, Value};

use crate::{record, Result};

macro_rules! item_kinds {
    ($($variant:ident = $tag:literal, $name:literal;)*) => {
        /// Type of a map item.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[cfg_attr(feature = "serde", derive(serde::Serialize))]
        #[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
        pub enum ItemKind {
            $($variant,)*
        }

        impl ItemKind {
            pub const ALL: &'static [ItemKind] = &[$(ItemKind::$variant,)*];

            pub fn from_tag(tag: u32) -> Option<Self> {
                match tag {
                    $($tag => Some(ItemKind::$variant),)*
                    _ => None,
                }
            }

            pub fn tag(self) -> u32 {
                match self {
                    $(ItemKind::$variant => $tag,)*
                }
            }

            pub fn name(self) -> &'static str {
                match self {
                    $(ItemKind::$variant => $name,)*
                }
            }
        }
    };
}

item_kinds! {
    Terrain = 1, "terrain";
    Building = 2, "building";
    Road = 3, "road";
    Prefab = 4, "prefab";
    Model = 5, "model";
    Company = 6, "company";
    Service = 7, "service";
    CutPlane = 8, "cut_plane";
    Mover = 9, "mover";
    NoWeather = 11, "no_weather";
    City = 12, "city";
    Hinge = 13, "hinge";
    AnimatedModel = 15, "animated_model";
    MapOverlay = 18, "map_overlay";
    Ferry = 19, "ferry";
    Sound = 21, "sound";
    Garage = 22, "garage";
    CameraPoint = 23, "camera_point";
    Trigger = 34, "trigger";
    FuelPump = 35, "fuel_pump";
    Sign = 36, "sign";
    BusStop = 37, "bus_stop";
    TrafficRule = 38, "traffic_rule";
    BezierPatch = 39, "bezier_patch";
    Compound = 40, "compound";
    Trajectory = 41, "trajectory";
    MapArea = 42, "map_area";
    FarModel = 43, "far_model";
    Curve = 44, "curve";
    CameraPath = 45, "camera_path";
    Cutscene = 46, "cutscene";
    Hookup = 47, "hookup";
    VisibilityArea = 48, "visibility_area";
    Gate = 49, "gate";
}

fn list(element: Layout) -> Layout {
    prefixed(element, Prim::U32_LE)
}

fn uids() -> Layout {
    list(u64())
}

fn tokens() -> Layout {
    list(token())
}

fn text() -> Layout {
    string_prefixed(Prim::U64_LE)
}

/// Fields after the shared header, per item type.
fn item_fields(kind: ItemKind) -> Vec<scs_struct::Field> {
    use ItemKind::*;
    match kind {
        Terrain => vec![
            field("start_node_uid", u64()),
            field("end_node_uid", u64()),
            field("length", f32()),
            field("right_profile", token()),
            field("left_profile", token()),
            field("right_size", f32()),
            field("left_size", f32()),
            field("quad_rows", fixed_array(u16(), 2)),
            field("materials", tokens()),
        ],
        Building => vec![
            field("scheme", token()),
            field("start_node_uid", u64()),
            field("end_node_uid", u64()),
            field("length", f32()),
            field("seed", u32()),
            field("stretch", f32()),
            field("height_offsets", list(f32())),
        ],
        Road => vec![
            field("road_look", token()),
            field("variant", token()),
            field("left_edge", token()),
            field("right_edge", token()),
            field("start_node_uid", u64()),
            field("end_node_uid", u64()),
            field("length", f32()),
            field(
                "vegetation",
                list(strukt(vec![
                    field("name", token()),
                    field("density", u16()),
                    field("scale", u8()),
                    field("start", f32()),
                    field("end", f32()),
                ])),
            ),
            field(
                "model_descriptions",
                list(strukt(vec![
                    field("name", token()),
                    field("position", f32()),
                    field("distance", f32()),
                ])),
            ),
            field("overlay_scheme", token()),
        ],
        Prefab => vec![
            field("model", token()),
            field("variant", token()),
            field("look", token()),
            field("additional_parts", tokens()),
            field("node_uids", uids()),
            field("connected_item_uids", uids()),
            field("semaphore_profile", token()),
            field("ferry_link_uid", u64()),
            field("origin_node", u16()),
            field(
                "node_looks",
                list(strukt(vec![
                    field("terrain_material", token()),
                    field("terrain_size", f32()),
                    field("vegetation", token()),
                ])),
            ),
        ],
        Model => vec![
            field("model", token()),
            field("look", token()),
            field("variant", token()),
            field("additional_parts", tokens()),
            field("node_uid", u64()),
            field("scale", floats(3)),
            field("terrain_material", token()),
            field("terrain_rotation", f32()),
        ],
        Company => vec![
            field("override_name", token()),
            field("city_name", token()),
            field("prefab_uid", u64()),
            field("node_uid", u64()),
            field("unloading_point_uids", uids()),
            field("loading_point_uids", uids()),
            field("sleep_point_uids", uids()),
            field("parking_point_uids", uids()),
            field("trailer_point_uids", uids()),
        ],
        Service => vec![
            field("node_uid", u64()),
            field("prefab_uid", u64()),
            field("node_uids", uids()),
        ],
        CutPlane => vec![field("node_uids", uids())],
        Mover => vec![
            field("model", token()),
            field("look", token()),
            field("variant", token()),
            field("additional_parts", tokens()),
            field("speed", f32()),
            field("end_delay", f32()),
            field("width", f32()),
            field("count", u32()),
            field("lengths", list(f32())),
            field("node_uids", uids()),
        ],
        NoWeather => vec![
            field("node_uid", u64()),
            field("width", f32()),
            field("height", f32()),
            field("fog_behavior", u32()),
        ],
        City => vec![
            field("city_name", token()),
            field("width", f32()),
            field("height", f32()),
            field("node_uid", u64()),
        ],
        Hinge => vec![
            field("model", token()),
            field("look", token()),
            field("node_uid", u64()),
            field("min_rotation", f32()),
            field("max_rotation", f32()),
        ],
        AnimatedModel => vec![
            field("tags", tokens()),
            field("model", token()),
            field("look", token()),
            field("node_uid", u64()),
        ],
        MapOverlay => vec![field("look", token()), field("node_uid", u64())],
        Ferry => vec![
            field("port", token()),
            field("prefab_uid", u64()),
            field("node_uid", u64()),
            field("exit_position", floats(3)),
        ],
        Sound => vec![
            field("name", token()),
            field("sound_path", text()),
            field("node_uid", u64()),
            field("range", f32()),
        ],
        Garage => vec![
            field("city_name", token()),
            field("building_type", u32()),
            field("node_uid", u64()),
            field("prefab_uid", u64()),
            field("trailer_spawn_point_uids", uids()),
        ],
        CameraPoint => vec![field("tags", tokens()), field("node_uid", u64())],
        Trigger => vec![
            field("tags", tokens()),
            field("node_uids", uids()),
            field(
                "actions",
                list(strukt(vec![
                    field("name", token()),
                    field("params", list(f32())),
                    field("texts", list(text())),
                ])),
            ),
            field("range", f32()),
            field("reset_delay", f32()),
            field("reset_distance", f32()),
            field("min_speed", f32()),
            field("max_speed", f32()),
        ],
        FuelPump => vec![field("node_uid", u64()), field("prefab_uid", u64())],
        Sign => vec![
            field("model", token()),
            field("node_uid", u64()),
            field("look", token()),
            field("variant", token()),
            field("parts", tokens()),
            field("template", token()),
            field("texts", list(text())),
        ],
        BusStop => vec![
            field("city_name", token()),
            field("prefab_uid", u64()),
            field("node_uid", u64()),
        ],
        TrafficRule => vec![
            field("tags", tokens()),
            field("node_uids", uids()),
            field("traffic_rule", token()),
            field("range", f32()),
        ],
        BezierPatch => vec![
            field("control_points", fixed_array(floats(3), 16)),
            field("width_division", u16()),
            field("length_division", u16()),
            field("node_uid", u64()),
            field("seed", u32()),
            field("vegetation", tokens()),
        ],
        Compound | VisibilityArea => {
            let mut fields = vec![field("node_uid", u64())];
            if kind == VisibilityArea {
                fields.extend([
                    field("width", f32()),
                    field("height", f32()),
                    field("hide_item_uids", uids()),
                ]);
            }
            fields.extend([
                field("items", list(deferred(item_layout))),
                field("nodes", list(node_layout().clone())),
            ]);
            fields
        }
        Trajectory => vec![
            field("node_uids", uids()),
            field("route_flags", u32()),
            field(
                "route_rules",
                list(strukt(vec![
                    field("node_index", u32()),
                    field("rule", token()),
                    field("params", floats(3)),
                ])),
            ),
            field(
                "checkpoints",
                list(strukt(vec![
                    field("route", token()),
                    field("checkpoint", token()),
                ])),
            ),
            field("tags", tokens()),
        ],
        MapArea => vec![field("node_uids", uids()), field("color", u32())],
        FarModel => vec![
            field("width", f32()),
            field("length", f32()),
            field("height", f32()),
            field(
                "models",
                list(strukt(vec![field("model", token()), field("scale", floats(3))])),
            ),
            field("node_uids", uids()),
        ],
        Curve => vec![
            field("model", token()),
            field("curve_flags", u32()),
            field("start_node_uid", u64()),
            field("end_node_uid", u64()),
            field("length", f32()),
            field("seed", u32()),
            field("stretch", f32()),
            field("scale", f32()),
            field("fixed_step", f32()),
            field("first_part", token()),
            field("center_part", token()),
            field("last_part", token()),
            field("height_offsets", list(f32())),
        ],
        CameraPath => vec![
            field("tags", tokens()),
            field("node_uids", uids()),
            field("track_point_uids", uids()),
            field("speed", f32()),
        ],
        Cutscene => vec![
            field("tags", tokens()),
            field("node_uid", u64()),
            field(
                "actions",
                list(strukt(vec![
                    field("params", list(u32())),
                    field("texts", list(text())),
                    field("target_tags", tokens()),
                    field("target_range", f32()),
                    field("action_flags", u32()),
                ])),
            ),
        ],
        Hookup => vec![field("name", token()), field("node_uid", u64())],
        Gate => vec![
            field("model", token()),
            field("node_uid", u64()),
            field(
                "activation_points",
                list(strukt(vec![
                    field("trigger_name", text()),
                    field("node_uid", u64()),
                ])),
            ),
        ],
    }
}

/// One map item, tagged by type.
pub fn item_layout() -> &'static Layout {
    static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
        versioned(
            Prim::U32_LE,
            vec![
                field("uid", u64()),
                field("flags", u32()),
                field("view_distance", u8()),
            ],
            ItemKind::ALL
                .iter()
                .map(|&kind| variant(kind.tag() as u64, kind.name(), item_fields(kind)))
                .collect(),
        )
    });
    &LAYOUT
}

/// One map node.
pub fn node_layout() -> &'static Layout {
    Node::layout()
}

/// A position and orientation that items attach to.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Node {
    pub uid: u64,
    /// World position in metres.
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub backward_item_uid: u64,
    pub forward_item_uid: u64,
    pub flags: u32,
}

impl Node {
    pub const SIZE: usize = 56;
    /// Stored positions are fixed point with this many units per metre.
    pub const POSITION_SCALE: f32 = 256.0;
}

impl Schema for Node {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("uid", u64()),
                field("position", fixed_array(i32(), 3)),
                field("rotation", floats(4)),
                field("backward_item_uid", u64()),
                field("forward_item_uid", u64()),
                field("flags", u32()),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        let raw = r.i32s("position")?;
        let mut position = [0f32; 3];
        for (slot, v) in position.iter_mut().zip(raw) {
            *slot = v as f32 / Self::POSITION_SCALE;
        }
        Ok(Self {
            uid: r.u64("uid")?,
            position,
            rotation: r.floats("rotation")?,
            backward_item_uid: r.u64("backward_item_uid")?,
            forward_item_uid: r.u64("forward_item_uid")?,
            flags: r.u32("flags")?,
        })
    }
}

/// A decoded map item.
///
/// The type-specific fields stay in [`Item::data`] under the names of the
/// item's layout; nested items and nodes of compounds and visibility areas
/// are lifted into [`Item::children`] and [`Item::child_nodes`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Item {
    pub kind: ItemKind,
    pub uid: u64,
    pub flags: u32,
    pub view_distance: u8,
    pub data: Record,
    pub children: Vec<Item>,
    pub child_nodes: Vec<Node>,
}

impl Item {
    /// Every node uid the item refers to, in field order.
    pub fn node_uids(&self) -> Vec<u64> {
        let mut out = Vec::new();
        for (name, value) in self.data.fields() {
            match name {
                "node_uid" | "start_node_uid" | "end_node_uid" => out.extend(value.as_u64()),
                "node_uids" => {
                    if let Some(items) = value.as_array() {
                        out.extend(items.iter().filter_map(Value::as_u64));
                    }
                }
                _ => {}
            }
        }
        out
    }

    /// A token field of the item's type-specific data.
    pub fn token(&self, name: &'static str) -> Option<Token> {
        self.data.token(name).ok()
    }
}

impl Schema for Item {
    fn layout() -> &'static Layout {
        item_layout()
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let variant = value
            .as_variant()
            .ok_or_else(|| DecodeError::type_mismatch(0, "item", "a versioned struct"))?;
        let r = &variant.record;
        let kind = u32::try_from(variant.tag)
            .ok()
            .and_then(ItemKind::from_tag)
            .ok_or_else(|| DecodeError::unknown_variant(r.offset(), variant.tag))?;

        let (children, child_nodes) = match kind {
            ItemKind::Compound | ItemKind::VisibilityArea => (
                r.array("items")?
                    .iter()
                    .map(Item::from_value)
                    .collect::<scs_struct::Result<_>>()?,
                r.array("nodes")?
                    .iter()
                    .map(Node::from_value)
                    .collect::<scs_struct::Result<_>>()?,
            ),
            _ => (Vec::new(), Vec::new()),
        };

        Ok(Self {
            kind,
            uid: r.u64("uid")?,
            flags: r.u32("flags")?,
            view_distance: r.u8("view_distance")?,
            data: r.clone(),
            children,
            child_nodes,
        })
    }
}

/// A decoded sector file.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Sector {
    pub version: u32,
    pub game_id: Token,
    pub items: Vec<Item>,
    pub nodes: Vec<Node>,
    pub visibility_area_children: Vec<u64>,
}

impl Schema for Sector {
    fn layout() -> &'static Layout {
        static LAYOUT: LazyLock<Layout> = LazyLock::new(|| {
            strukt(vec![
                field("version", u32()),
                field("game_id", token()),
                field("items", list(item_layout().clone())),
                field("nodes", list(node_layout().clone())),
                field("visibility_area_children", uids()),
            ])
        });
        &LAYOUT
    }

    fn from_value(value: &Value) -> scs_struct::Result<Self> {
        let r = record(value)?;
        Ok(Self {
            version: r.u32("version")?,
            game_id: r.token("game_id")?,
            items: r
                .array("items")?
                .iter()
                .map(Item::from_value)
                .collect::<scs_struct::Result<_>>()?,
            nodes: r
                .array("nodes")?
                .iter()
                .map(Node::from_value)
                .collect::<scs_struct::Result<_>>()?,
            visibility_area_children: r.u64s("visibility_area_children")?,
        })
    }
}

impl Sector {
    /// Decode a `.base` sector buffer.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let sector = <Self as Schema>::decode(data)?;
        tracing::debug!(
            version = sector.version,
            items = sector.items.len(),
            nodes = sector.nodes.len(),
            "decoded sector"
        );
        Ok(sector)
    }

    /// Items of one type, top level only.
    pub fn items_of(&self, kind: ItemKind) -> impl Iterator<Item = &Item> {
        self.items.iter().filter(move |item| item.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use scs_struct::DecodeErrorKind;

    #[derive(Default)]
    struct Bytes(Vec<u8>);

    impl Bytes {
        fn u8(mut self, v: u8) -> Self {
            self.0.push(v);
            self
        }
        fn u32(mut self, v: u32) -> Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }
        fn i32(mut self, v: i32) -> Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }
        fn u64(mut self, v: u64) -> Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }
        fn f32(mut self, v: f32) -> Self {
            self.0.extend_from_slice(&v.to_le_bytes());
            self
        }
        fn token(self, text: &str) -> Self {
            let token = Token::encode(text).unwrap();
            self.u64(token.0)
        }
        fn raw(mut self, other: Bytes) -> Self {
            self.0.extend(other.0);
            self
        }
        fn header(self, kind: ItemKind, uid: u64) -> Self {
            self.u32(kind.tag()).u64(uid).u32(0).u8(100)
        }
    }

    fn node(uid: u64, x: i32, backward: u64, forward: u64) -> Bytes {
        Bytes::default()
            .u64(uid)
            .i32(x)
            .i32(0)
            .i32(-512)
            .f32(1.0)
            .f32(0.0)
            .f32(0.0)
            .f32(0.0)
            .u64(backward)
            .u64(forward)
            .u32(0)
    }

    fn road(uid: u64, start: u64, end: u64) -> Bytes {
        Bytes::default()
            .header(ItemKind::Road, uid)
            .token("ger1")
            .token("")
            .token("")
            .token("")
            .u64(start)
            .u64(end)
            .f32(42.5)
            .u32(0)
            .u32(0)
            .token("")
    }

    fn model(uid: u64, node: u64) -> Bytes {
        Bytes::default()
            .header(ItemKind::Model, uid)
            .token("fence")
            .token("default")
            .token("")
            .u32(1)
            .token("gate")
            .u64(node)
            .f32(1.0)
            .f32(1.0)
            .f32(1.0)
            .token("")
            .f32(0.0)
    }

    fn sector_bytes() -> Vec<u8> {
        let compound = Bytes::default()
            .header(ItemKind::Compound, 30)
            .u64(3)
            .u32(1)
            .raw(model(31, 4))
            .u32(1)
            .raw(node(4, 2560, 0, 31));

        Bytes::default()
            .u32(900)
            .token("ets2")
            .u32(2)
            .raw(road(10, 1, 2))
            .raw(compound)
            .u32(2)
            .raw(node(1, 256, 0, 10))
            .raw(node(2, 768, 10, 0))
            .u32(1)
            .u64(30)
            .0
    }

    #[test]
    fn test_node_size() {
        assert_eq!(Node::layout().fixed_size(), Some(Node::SIZE));
        assert_eq!(node(1, 0, 0, 0).0.len(), Node::SIZE);
    }

    #[test]
    fn test_every_kind_has_a_layout() {
        for &kind in ItemKind::ALL {
            assert_eq!(ItemKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(ItemKind::ALL.len(), 34);
    }

    #[test]
    fn test_parse_sector() {
        let sector = Sector::parse(&sector_bytes()).unwrap();
        assert_eq!(sector.version, 900);
        assert_eq!(sector.game_id.decode(), "ets2");
        assert_eq!(sector.visibility_area_children, [30]);

        assert_eq!(sector.items.len(), 2);
        let road = &sector.items[0];
        assert_eq!(road.kind, ItemKind::Road);
        assert_eq!(road.uid, 10);
        assert_eq!(road.view_distance, 100);
        assert_eq!(road.node_uids(), [1, 2]);
        assert_eq!(road.token("road_look").unwrap().decode(), "ger1");
        assert_eq!(road.data.f32("length").unwrap(), 42.5);

        assert_eq!(sector.nodes.len(), 2);
        assert_eq!(sector.nodes[0].position, [1.0, 0.0, -2.0]);
        assert_eq!(sector.nodes[1].backward_item_uid, 10);
    }

    #[test]
    fn test_compound_children() {
        let sector = Sector::parse(&sector_bytes()).unwrap();
        let compound = sector.items_of(ItemKind::Compound).next().unwrap();
        assert_eq!(compound.node_uids(), [3]);

        assert_eq!(compound.children.len(), 1);
        let child = &compound.children[0];
        assert_eq!(child.kind, ItemKind::Model);
        assert_eq!(child.node_uids(), [4]);
        assert_eq!(child.data.tokens("additional_parts").unwrap()[0].decode(), "gate");

        assert_eq!(compound.child_nodes.len(), 1);
        assert_eq!(compound.child_nodes[0].position[0], 10.0);
    }

    #[test]
    fn test_unknown_item_type() {
        let data = Bytes::default()
            .u32(900)
            .token("ets2")
            .u32(1)
            .u32(99)
            .u64(1)
            .0;
        let err = Sector::parse(&data).unwrap_err();
        match err {
            Error::Decode(e) => {
                assert_eq!(e.kind, DecodeErrorKind::UnknownVariant { tag: 99 });
                assert_eq!(e.offset, 16);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_truncated_item() {
        let mut data = sector_bytes();
        data.truncate(40);
        assert!(matches!(Sector::parse(&data), Err(Error::Decode(_))));
    }
}
