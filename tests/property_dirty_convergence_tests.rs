use draw_rs::surface::attrs::host_attributes;
use draw_rs::surface::{AttrValue, Reconcilable, Transformable};
use draw_rs::{HostDocument, MemoryDocument, SpriteDescriptor, SpriteKind, Surface, SurfaceConfig};
use proptest::prelude::*;

const NAMES: [&str; 6] = ["fill", "stroke", "radius", "x", "opacity", "class"];

#[derive(Debug, Clone)]
enum Op {
    Set(usize, usize, AttrValue),
    Remove(usize, usize),
    Hide(usize),
    Show(usize),
    SetZ(usize, i32),
    Translate(usize, f64, f64),
    Redraw(usize),
    Reconcile(usize),
}

fn value_strategy() -> impl Strategy<Value = AttrValue> {
    prop_oneof![
        (0i32..50).prop_map(|value| AttrValue::Number(f64::from(value))),
        prop::sample::select(vec!["red", "#00ff00", "none", "marker"]).prop_map(AttrValue::from),
    ]
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0usize..4, 0usize..NAMES.len(), value_strategy()).prop_map(|(sprite, name, value)| Op::Set(sprite, name, value)),
        (0usize..4, 0usize..NAMES.len()).prop_map(|(sprite, name)| Op::Remove(sprite, name)),
        (0usize..4).prop_map(Op::Hide),
        (0usize..4).prop_map(Op::Show),
        (0usize..4, -2i32..3).prop_map(|(sprite, z_index)| Op::SetZ(sprite, z_index)),
        (0usize..4, -20i32..20, -20i32..20)
            .prop_map(|(sprite, x, y)| Op::Translate(sprite, f64::from(x), f64::from(y))),
        (0usize..4).prop_map(Op::Redraw),
        (0usize..4).prop_map(Op::Reconcile),
    ]
}

fn seeded_surface() -> Surface<MemoryDocument> {
    let mut surface = Surface::new(MemoryDocument::new(), SurfaceConfig::default()).expect("surface");
    for kind in [SpriteKind::Circle, SpriteKind::Rect, SpriteKind::Ellipse, SpriteKind::Circle] {
        surface
            .add_sprite(
                SpriteDescriptor::new(kind)
                    .with_attr("fill", "steelblue")
                    .with_attr("radius", 4.0),
            )
            .expect("sprite");
    }
    surface.render_all().expect("render");
    surface
}

fn apply(surface: &mut Surface<MemoryDocument>, op: &Op) {
    let ids: Vec<_> = surface.sprite_ids().collect();
    let pick = |index: usize| ids[index % ids.len()];
    match op {
        Op::Set(sprite, name, value) => {
            surface
                .set_attributes(pick(*sprite), [(NAMES[*name], value.clone())])
                .expect("set");
        }
        Op::Remove(sprite, name) => {
            surface
                .sprite_mut(pick(*sprite))
                .expect("sprite")
                .remove_attribute(NAMES[*name]);
        }
        Op::Hide(sprite) => surface.hide(pick(*sprite)).expect("hide"),
        Op::Show(sprite) => surface.show(pick(*sprite)).expect("show"),
        Op::SetZ(sprite, z_index) => surface.set_z_index(pick(*sprite), *z_index).expect("z-index"),
        Op::Translate(sprite, x, y) => {
            surface
                .sprite_mut(pick(*sprite))
                .expect("sprite")
                .set_translation(*x, *y);
        }
        Op::Redraw(sprite) => surface.redraw(pick(*sprite)).expect("redraw"),
        Op::Reconcile(sprite) => surface.reconcile(pick(*sprite)).expect("reconcile"),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn one_pass_converges_host_to_logical_state(ops in prop::collection::vec(op_strategy(), 1..30)) {
        let mut surface = seeded_surface();
        let hidden_class = surface.config().hidden_class.clone();

        for op in &ops {
            apply(&mut surface, op);
            surface.render_all().expect("render");

            let doc = surface.document();
            for id in surface.sprite_ids() {
                let sprite = surface.sprite(id).expect("sprite");
                prop_assert!(sprite.is_clean(), "{:?} left dirty after {:?}", id, op);
                let element = sprite.element().expect("element");

                let host = host_attributes(sprite.kind(), sprite.attributes(), true);
                for (name, value) in host.iter().filter(|(name, _)| name.as_str() != "class") {
                    prop_assert_eq!(doc.attribute(element, name), Some(value.as_str()), "{}", name);
                }
                for name in ["stroke", "opacity"] {
                    if !host.contains_key(name) {
                        prop_assert_eq!(doc.attribute(element, name), None, "{}", name);
                    }
                }

                let classes: Vec<&str> = doc
                    .attribute(element, "class")
                    .map(|class| class.split_whitespace().collect())
                    .unwrap_or_default();
                prop_assert_eq!(classes.contains(&hidden_class.as_str()), sprite.is_hidden());

                let matrix = sprite.matrix();
                let expected = (!matrix.is_identity()).then(|| matrix.to_svg());
                prop_assert_eq!(doc.attribute(element, "transform"), expected.as_deref());
            }
        }
    }
}
