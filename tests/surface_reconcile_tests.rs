use std::cell::Cell;
use std::rc::Rc;

use approx::assert_abs_diff_eq;
use draw_rs::surface::{INFRASTRUCTURE_OFFSET, Reconcilable};
use draw_rs::{
    DrawError, ElementId, HostDocument, MemoryDocument, Sprite, SpriteDescriptor, SpriteId, SpriteKind,
    Surface, SurfaceConfig, TransformOp,
};

fn surface() -> Surface<MemoryDocument> {
    Surface::new(MemoryDocument::new(), SurfaceConfig::default()).expect("surface")
}

fn element_of(surface: &Surface<MemoryDocument>, id: SpriteId) -> ElementId {
    surface.sprite(id).and_then(Sprite::element).expect("sprite element")
}

fn rect(surface: &mut Surface<MemoryDocument>) -> SpriteId {
    surface
        .add_sprite(
            SpriteDescriptor::new(SpriteKind::Rect)
                .with_attr("width", 10.0)
                .with_attr("height", 10.0),
        )
        .expect("rect")
}

fn sprite_children(surface: &Surface<MemoryDocument>) -> Vec<ElementId> {
    surface.document().children(surface.root())[INFRASTRUCTURE_OFFSET..].to_vec()
}

#[test]
fn surface_bootstraps_its_infrastructure() {
    let surface = surface();
    let doc = surface.document();
    assert_eq!(doc.tag(surface.root()), Some("svg"));
    assert_eq!(doc.attribute(surface.root(), "width"), Some("400"));
    assert_eq!(doc.children(surface.root()), &[surface.defs(), surface.background()]);
    assert_eq!(doc.attribute(surface.background(), "fill"), Some("none"));
}

#[test]
fn circle_is_created_then_updated_with_minimal_writes() {
    let mut surface = surface();
    let id = surface
        .add_sprite(
            SpriteDescriptor::new(SpriteKind::Circle)
                .with_attr("x", 10.0)
                .with_attr("y", 20.0)
                .with_attr("radius", 5.0)
                .with_attr("fill", "red"),
        )
        .expect("circle");
    assert!(surface.sprite(id).expect("sprite").element().is_none());

    surface.render_all().expect("render");
    let element = element_of(&surface, id);
    {
        let doc = surface.document();
        assert_eq!(doc.tag(element), Some("circle"));
        assert_eq!(doc.attribute(element, "id"), Some("sprite-1"));
        assert_eq!(doc.attribute(element, "cx"), Some("10"));
        assert_eq!(doc.attribute(element, "cy"), Some("20"));
        assert_eq!(doc.attribute(element, "r"), Some("5"));
        assert_eq!(doc.attribute(element, "fill"), Some("red"));
        assert!(doc.attribute(element, "x").is_none());
        assert_eq!(sprite_children(&surface), vec![element]);
    }

    surface.document_mut().reset_write_counters();
    surface.render_all().expect("clean pass");
    assert_eq!(surface.document().total_attribute_writes(), 0);

    surface.set_attributes(id, [("radius", 8.0)]).expect("grow");
    surface.render_all().expect("render");
    let doc = surface.document();
    assert_eq!(doc.attribute(element, "r"), Some("8"));
    assert_eq!(doc.attribute_writes(element, "r"), 1);
    assert_eq!(doc.total_attribute_writes(), 1);
}

#[test]
fn explicit_zero_center_wins_over_position() {
    let mut surface = surface();
    let id = surface
        .add_sprite(
            SpriteDescriptor::new(SpriteKind::Circle)
                .with_attr("cx", 0.0)
                .with_attr("x", 25.0),
        )
        .expect("circle");
    surface.render_all().expect("render");
    let element = element_of(&surface, id);
    assert_eq!(surface.document().attribute(element, "cx"), Some("0"));
    assert_eq!(surface.document().attribute(element, "cy"), Some("0"));
}

#[test]
fn z_index_reorders_elements() {
    let mut surface = surface();
    let a = rect(&mut surface);
    let b = rect(&mut surface);
    let c = rect(&mut surface);
    surface.render_all().expect("render");
    let (ea, eb, ec) = (element_of(&surface, a), element_of(&surface, b), element_of(&surface, c));
    assert_eq!(sprite_children(&surface), vec![ea, eb, ec]);

    surface.set_z_index(a, 5).expect("z");
    surface.render_all().expect("render");
    assert_eq!(surface.sprite_ids().collect::<Vec<_>>(), vec![b, c, a]);
    assert_eq!(sprite_children(&surface), vec![eb, ec, ea]);
}

#[test]
fn z_index_applies_after_single_sprite_passes() {
    let mut surface = surface();
    let a = rect(&mut surface);
    let b = rect(&mut surface);
    surface.render_all().expect("render");
    let (ea, eb) = (element_of(&surface, a), element_of(&surface, b));

    surface.set_z_index(a, 5).expect("z");
    surface.redraw(a).expect("redraw");
    surface.render_all().expect("render");
    assert_eq!(surface.sprite_ids().collect::<Vec<_>>(), vec![b, a]);
    assert_eq!(sprite_children(&surface), vec![eb, ea]);

    surface.set_z_index(b, 9).expect("z");
    surface.reconcile(b).expect("reconcile");
    surface.render_all().expect("render");
    assert_eq!(surface.sprite_ids().collect::<Vec<_>>(), vec![a, b]);
    assert_eq!(sprite_children(&surface), vec![ea, eb]);
}

#[test]
fn inserted_and_moved_sprites_follow_logical_order() {
    let mut surface = surface();
    let a = rect(&mut surface);
    let b = rect(&mut surface);
    let c = rect(&mut surface);
    surface.render_all().expect("render");

    let d = surface
        .insert_sprite(0, SpriteDescriptor::new(SpriteKind::Rect))
        .expect("insert");
    surface.render_all().expect("render");
    let elements: Vec<ElementId> = [d, a, b, c].iter().map(|id| element_of(&surface, *id)).collect();
    assert_eq!(sprite_children(&surface), elements);

    surface.move_sprite(d, 3).expect("move");
    surface.render_all().expect("render");
    let elements: Vec<ElementId> = [a, b, c, d].iter().map(|id| element_of(&surface, *id)).collect();
    assert_eq!(sprite_children(&surface), elements);
}

#[test]
fn removing_a_sprite_destroys_its_element() {
    let mut surface = surface();
    let a = rect(&mut surface);
    let b = rect(&mut surface);
    surface.render_all().expect("render");
    let eb = element_of(&surface, b);
    let destroyed = surface.document().destroyed_count();

    let removed = surface.remove_sprite(b).expect("remove");
    assert_eq!(removed.id(), b);
    assert!(removed.element().is_none());
    assert!(!surface.document().contains(eb));
    assert_eq!(surface.document().destroyed_count(), destroyed + 1);
    assert_eq!(sprite_children(&surface), vec![element_of(&surface, a)]);

    assert!(matches!(surface.remove_sprite(b), Err(DrawError::UnknownSprite(_))));
}

#[test]
fn hiding_toggles_a_class() {
    let mut surface = surface();
    let id = surface
        .add_sprite(SpriteDescriptor::new(SpriteKind::Rect).with_attr("class", "marker"))
        .expect("rect");
    surface.render_all().expect("render");
    let element = element_of(&surface, id);
    assert_eq!(surface.document().attribute(element, "class"), Some("marker"));

    surface.hide(id).expect("hide");
    surface.render_all().expect("render");
    assert!(surface.sprite(id).expect("sprite").is_hidden());
    assert_eq!(
        surface.document().attribute(element, "class"),
        Some("marker x-hide-visibility")
    );
    assert!(surface.document().attribute(element, "hidden").is_none());

    surface.set_attributes(id, [("class", "")]).expect("unclass");
    surface.show(id).expect("show");
    surface.render_all().expect("render");
    assert!(surface.document().attribute(element, "class").is_none());
}

#[test]
fn text_lines_become_runs() {
    let mut surface = surface();
    let id = surface
        .add_sprite(
            SpriteDescriptor::new(SpriteKind::Text)
                .with_attr("x", 5.0)
                .with_attr("y", 7.0)
                .with_attr("font", "bold 10px Arial")
                .with_attr("text", "first\n\nthird"),
        )
        .expect("text");
    surface.render_all().expect("render");
    let element = element_of(&surface, id);

    let runs = {
        let doc = surface.document();
        assert_eq!(doc.style(element, "font"), Some("bold 10px Arial"));
        assert_eq!(doc.attribute(element, "text-anchor"), Some("start"));
        let runs = doc.children(element).to_vec();
        assert_eq!(runs.len(), 2);
        assert_eq!(doc.text(runs[0]), Some("first"));
        assert_eq!(doc.text(runs[1]), Some("third"));
        assert_eq!(doc.attribute(runs[0], "x"), Some("5"));
        assert_eq!(doc.attribute(runs[0], "dy"), Some("2.5"));
        assert_eq!(doc.attribute(runs[1], "dy"), Some("24"));
        runs
    };

    surface.set_attributes(id, [("fill", "blue")]).expect("recolor");
    surface.render_all().expect("render");
    assert_eq!(surface.document().children(element), runs.as_slice());

    surface.set_attributes(id, [("text", "changed")]).expect("retext");
    surface.render_all().expect("render");
    let doc = surface.document();
    let runs = doc.children(element);
    assert_eq!(runs.len(), 1);
    assert_eq!(doc.text(runs[0]), Some("changed"));
}

#[test]
fn path_data_is_normalized() {
    let mut surface = surface();
    let id = surface
        .add_sprite(SpriteDescriptor::new(SpriteKind::Path).with_attr("path", "m0 0 l10 0 l0 10z"))
        .expect("path");
    surface.render_all().expect("render");
    let element = element_of(&surface, id);
    assert_eq!(surface.document().attribute(element, "d"), Some("M0,0L10,0L10,10Z"));

    surface.set_attributes(id, [("stroke", "black")]).expect("stroke");
    surface.document_mut().reset_write_counters();
    surface.render_all().expect("render");
    assert_eq!(surface.document().attribute_writes(element, "d"), 0);
    assert_eq!(surface.document().attribute(element, "d"), Some("M0,0L10,0L10,10Z"));
}

#[test]
fn image_source_is_written_as_href() {
    let mut surface = surface();
    let id = surface
        .add_sprite(
            SpriteDescriptor::new(SpriteKind::Image)
                .with_attr("src", "icon.png")
                .with_attr("width", 16.0),
        )
        .expect("image");
    surface.render_all().expect("render");
    let element = element_of(&surface, id);
    let doc = surface.document();
    assert_eq!(doc.attribute(element, "href"), Some("icon.png"));
    assert!(doc.attribute(element, "src").is_none());
    assert_eq!(doc.attribute(element, "preserveAspectRatio"), Some("none"));
}

#[test]
fn rotation_pivots_on_the_bbox_center() {
    let mut surface = surface();
    let id = surface
        .add_sprite(
            SpriteDescriptor::new(SpriteKind::Rect)
                .with_attr("width", 10.0)
                .with_attr("height", 10.0)
                .with_transform(TransformOp::Rotate {
                    degrees: 90.0,
                    x: None,
                    y: None,
                }),
        )
        .expect("rect");
    surface.render_all().expect("render");
    let element = element_of(&surface, id);
    assert_eq!(
        surface.document().attribute(element, "transform"),
        Some("matrix(0.000000000,1.000000000,-1.000000000,0.000000000,10.000000000,0.000000000)")
    );

    let bbox = surface.sprite_bbox(id, true).expect("bbox");
    assert_abs_diff_eq!(bbox.x, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(bbox.y, 0.0, epsilon = 1e-9);
    assert_abs_diff_eq!(bbox.width, 10.0, epsilon = 1e-9);
    assert_abs_diff_eq!(bbox.height, 10.0, epsilon = 1e-9);
}

#[test]
fn listener_changes_land_on_the_next_pass() {
    let mut surface = surface();
    let calls = Rc::new(Cell::new(0usize));
    let seen = Rc::clone(&calls);
    surface.add_listener(move |sprite: &mut Sprite| {
        seen.set(seen.get() + 1);
        sprite.set_attributes([("stroke", "black")]);
    });
    let id = rect(&mut surface);

    surface.render_all().expect("render");
    let element = element_of(&surface, id);
    assert_eq!(calls.get(), 1);
    assert!(surface.document().attribute(element, "stroke").is_none());
    assert!(!surface.sprite(id).expect("sprite").is_clean());

    surface.render_all().expect("render");
    assert_eq!(calls.get(), 1);
    assert_eq!(surface.document().attribute(element, "stroke"), Some("black"));
    assert!(surface.sprite(id).expect("sprite").is_clean());
}

#[test]
fn groups_fan_out_attribute_updates() {
    let mut surface = surface();
    let a = surface
        .add_sprite(SpriteDescriptor::new(SpriteKind::Rect).in_group("row"))
        .expect("a");
    let b = surface
        .add_sprite(SpriteDescriptor::new(SpriteKind::Rect).in_group("row"))
        .expect("b");
    let loner = rect(&mut surface);
    assert_eq!(surface.group_members("row"), vec![a, b]);

    assert_eq!(surface.set_group_attributes("row", [("fill", "green")]), 2);
    surface.render_all().expect("render");
    assert_eq!(surface.document().attribute(element_of(&surface, a), "fill"), Some("green"));
    assert_eq!(surface.document().attribute(element_of(&surface, loner), "fill"), Some("none"));

    surface.set_sprite_group(b, None).expect("leave");
    assert_eq!(surface.group_members("row"), vec![a]);
    assert_eq!(surface.remove_group("row"), 1);
    assert!(surface.sprite(a).is_none());
    assert_eq!(surface.len(), 2);
}

#[test]
fn overlay_stays_above_sprites() {
    let mut surface = surface();
    rect(&mut surface);
    surface.render_all().expect("render");
    let overlay = {
        let mut ctx = surface.context();
        ctx.fill_rect(0.0, 0.0, 1.0, 1.0);
        ctx.target()
    };

    let late = rect(&mut surface);
    surface.render_all().expect("render");
    let children = surface.document().children(surface.root());
    assert_eq!(children.last(), Some(&overlay));
    assert_eq!(children[children.len() - 2], element_of(&surface, late));
}

#[test]
fn clear_destroys_everything_but_the_infrastructure() {
    let mut surface = surface();
    rect(&mut surface);
    rect(&mut surface);
    surface.render_all().expect("render");
    surface.context().fill_rect(0.0, 0.0, 1.0, 1.0);

    surface.clear();
    assert!(surface.is_empty());
    assert_eq!(
        surface.document().children(surface.root()),
        &[surface.defs(), surface.background()]
    );
}

#[test]
fn clip_rect_is_backed_by_a_clip_path() {
    let mut surface = surface();
    let id = surface
        .add_sprite(
            SpriteDescriptor::new(SpriteKind::Rect)
                .with_attr("width", 100.0)
                .with_attr("height", 100.0)
                .with_attr("clip-rect", "0 0 50 40"),
        )
        .expect("rect");
    surface.render_all().expect("render");

    let element = element_of(&surface, id);
    let clip = {
        let doc = surface.document();
        assert_eq!(doc.attribute(element, "clip-path"), Some("url(#sprite-1-clip)"));
        assert!(doc.attribute(element, "clip-rect").is_none());
        let defs = doc.children(surface.defs());
        assert_eq!(defs.len(), 1);
        let clip = defs[0];
        assert_eq!(doc.tag(clip), Some("clipPath"));
        assert_eq!(doc.attribute(clip, "id"), Some("sprite-1-clip"));
        let shape = doc.children(clip)[0];
        assert_eq!(doc.tag(shape), Some("rect"));
        assert_eq!(doc.attribute(shape, "width"), Some("50"));
        assert_eq!(doc.attribute(shape, "height"), Some("40"));
        clip
    };

    surface.set_attributes(id, [("clip-rect", "5,5,10,20")]).expect("update");
    surface.render_all().expect("render");
    {
        let doc = surface.document();
        assert_eq!(doc.children(surface.defs()), &[clip]);
        let shape = doc.children(clip)[0];
        assert_eq!(doc.attribute(shape, "x"), Some("5"));
        assert_eq!(doc.attribute(shape, "height"), Some("20"));
    }

    surface
        .sprite_mut(id)
        .expect("sprite")
        .remove_attribute("clip-rect");
    surface.render_all().expect("render");
    assert!(surface.document().attribute(element, "clip-path").is_none());
    assert!(!surface.document().contains(clip));
    assert!(surface.document().children(surface.defs()).is_empty());
}

#[test]
fn removing_a_clipped_sprite_frees_its_clip_path() {
    let mut surface = surface();
    let id = surface
        .add_sprite(SpriteDescriptor::new(SpriteKind::Circle).with_attr("clip-rect", "0 0 8 8"))
        .expect("circle");
    surface.render_all().expect("render");
    assert_eq!(surface.document().children(surface.defs()).len(), 1);

    surface.remove_sprite(id).expect("remove");
    assert!(surface.document().children(surface.defs()).is_empty());
}
