//! Binary container codec.
//!
//! XVIZ's compact wire form interleaves a JSON "skeleton" with raw numeric
//! and image buffers. The codec packs flattenable payloads out of the JSON
//! tree into addressable buffer tables ([`encode_binary`]) and splices them
//! back on the way in ([`decode_binary`]).
//!
//! Addressing uses a strict pointer grammar (`#/accessors/<n>`,
//! `#/images/<n>`) with positional resolution and a defined escaping rule
//! for literal strings that collide with it; see [`pointer`].
//!
//! Round-trip contract: `decode_binary(encode_binary(tree))` equals `tree`
//! up to the numeric widening the flattening policy declares: vertex
//! coordinates pass through f32, color components come back as integers in
//! 0-255, and nested coordinate records come back flat.

mod decode;
mod encode;
pub mod format;
pub mod pointer;

pub use decode::decode_binary;
pub use encode::encode_binary;
pub use format::{has_container_magic, ImageEncoding, ScalarType};

pub(crate) use encode::{flatten_colors, flatten_vertices};

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn round_trips_flat_vertex_arrays() {
        let tree = json!({
            "streams": {
                "/lane": {"vertices": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]},
            }
        });
        let decoded = decode_binary(&encode_binary(&tree).unwrap()).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn nested_vertex_records_come_back_flat() {
        let tree = json!({"vertices": [[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]]});
        let decoded = decode_binary(&encode_binary(&tree).unwrap()).unwrap();
        assert_eq!(decoded, json!({"vertices": [1.0, 2.0, 3.0, 4.0, 5.0, 6.0]}));
    }

    #[test]
    fn colors_round_trip_as_integers() {
        let tree = json!({"colors": [[0, 0, 255], [255, 128, 0]]});
        let decoded = decode_binary(&encode_binary(&tree).unwrap()).unwrap();
        assert_eq!(decoded, json!({"colors": [0, 0, 255, 255, 128, 0]}));
    }

    #[test]
    fn stride_four_colors_keep_alpha() {
        let tree = json!({"colors": [[0, 0, 255, 255]]});
        let decoded = decode_binary(&encode_binary(&tree).unwrap()).unwrap();
        assert_eq!(decoded, json!({"colors": [0, 0, 255, 255]}));
    }

    #[test]
    fn image_payloads_round_trip() {
        let tree = json!({
            "images": [{"format": "png", "data": [137, 80, 78, 71], "width_px": 2, "height_px": 2}]
        });
        let decoded = decode_binary(&encode_binary(&tree).unwrap()).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn untouched_structure_survives_exactly() {
        let tree = json!({
            "type": "xviz/state_update",
            "data": {
                "updates": [{
                    "timestamp": 1001.5,
                    "primitives": {
                        "/objects": {
                            "polygons": [{"vertices": [1.0, 1.0, 0.0, 2.0, 1.0, 0.0, 2.0, 2.0, 0.0]}]
                        }
                    },
                    "extra": {"nested": [true, null, "text", 7]},
                }]
            }
        });
        let decoded = decode_binary(&encode_binary(&tree).unwrap()).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn pointer_colliding_literals_round_trip() {
        let tree = json!({"a": "#/accessors/0", "b": "##/images/1", "c": "#plain"});
        let decoded = decode_binary(&encode_binary(&tree).unwrap()).unwrap();
        assert_eq!(decoded, tree);
    }

    #[test]
    fn detection_magic_matches_encoder_output() {
        let bytes = encode_binary(&json!({})).unwrap();
        assert!(has_container_magic(&bytes));
        assert!(!has_container_magic(b"{\"json\": true}"));
        assert!(!has_container_magic(b"XV"));
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        fn arb_point() -> impl Strategy<Value = [f32; 3]> {
            // Finite values only; JSON cannot carry NaN/inf.
            [-1.0e6f32..1.0e6, -1.0e6f32..1.0e6, -1.0e6f32..1.0e6]
        }

        proptest! {
            #[test]
            fn vertex_buffers_round_trip(points in prop::collection::vec(arb_point(), 0..64)) {
                let flat: Vec<f64> = points.iter().flatten().map(|c| *c as f64).collect();
                let tree = json!({"vertices": flat});
                let decoded = decode_binary(&encode_binary(&tree).unwrap()).unwrap();
                prop_assert_eq!(decoded, tree);
            }

            #[test]
            fn color_buffers_round_trip(colors in prop::collection::vec([0u8..=255, 0u8..=255, 0u8..=255], 1..32)) {
                let nested: Vec<Vec<u8>> = colors.iter().map(|c| c.to_vec()).collect();
                let flat: Vec<u8> = colors.iter().flatten().copied().collect();
                let tree = json!({"colors": nested});
                let decoded = decode_binary(&encode_binary(&tree).unwrap()).unwrap();
                prop_assert_eq!(decoded, json!({"colors": flat}));
            }

            #[test]
            fn arbitrary_strings_survive(s in "\\PC*") {
                let tree = json!({"s": s});
                let decoded = decode_binary(&encode_binary(&tree).unwrap()).unwrap();
                prop_assert_eq!(decoded, tree);
            }
        }
    }
}
