use draw_rs::{DrawError, MemoryDocument, Surface, SurfaceConfig};

#[test]
fn defaults_are_valid() {
    let config = SurfaceConfig::default();
    config.validate().expect("default config");
    assert_eq!(config.hidden_class, "x-hide-visibility");
    assert_eq!(config.sprite_id_prefix, "sprite-");
    assert_eq!(config.gradient_id_prefix, "gradient-");
}

#[test]
fn partial_json_falls_back_to_defaults() {
    let config = SurfaceConfig::from_json_str(r#"{"width": 640, "height": 480}"#).expect("config");
    assert_eq!(config, SurfaceConfig::new(640.0, 480.0));
}

#[test]
fn json_round_trip_keeps_every_field() {
    let config = SurfaceConfig::new(800.0, 600.0)
        .with_hidden_class("is-hidden")
        .with_id_prefixes("s", "g")
        .with_text_metrics(1.5, 0.3)
        .with_default_font_size(14.0)
        .with_background_fill("#fff")
        .with_view_box(-10.0, -10.0, 820.0, 620.0);
    let json = config.to_json_pretty().expect("serialize");
    assert_eq!(SurfaceConfig::from_json_str(&json).expect("parse"), config);
}

#[test]
fn invalid_configs_are_refused() {
    let cases = [
        SurfaceConfig::new(-1.0, 10.0),
        SurfaceConfig::new(f64::NAN, 10.0),
        SurfaceConfig::default().with_hidden_class("two words"),
        SurfaceConfig::default().with_hidden_class(""),
        SurfaceConfig::default().with_id_prefixes("same-", "same-"),
        SurfaceConfig::default().with_id_prefixes("", "g"),
        SurfaceConfig::default().with_text_metrics(0.0, 0.25),
        SurfaceConfig::default().with_default_font_size(-3.0),
        SurfaceConfig::default().with_view_box(0.0, 0.0, f64::INFINITY, 10.0),
        SurfaceConfig::default().with_view_box(0.0, 0.0, -1.0, 10.0),
    ];
    for config in cases {
        assert!(
            matches!(config.validate(), Err(DrawError::InvalidConfig(_))),
            "{config:?}"
        );
        assert!(Surface::new(MemoryDocument::new(), config).is_err());
    }
}

#[test]
fn resize_updates_root_and_background() {
    use draw_rs::HostDocument;

    let mut surface = Surface::new(MemoryDocument::new(), SurfaceConfig::default()).expect("surface");
    surface.set_size(1024.0, 768.0).expect("resize");
    let doc = surface.document();
    assert_eq!(doc.attribute(surface.root(), "width"), Some("1024"));
    assert_eq!(doc.attribute(surface.background(), "height"), Some("768"));
    assert_eq!(surface.config().width, 1024.0);

    assert!(surface.set_size(-5.0, 10.0).is_err());
    assert_eq!(surface.config().width, 1024.0);
}

#[test]
fn malformed_json_is_a_config_error() {
    assert!(matches!(
        SurfaceConfig::from_json_str("{\"width\": \"wide\"}"),
        Err(DrawError::InvalidConfig(_))
    ));
}

#[test]
fn view_box_is_written_on_the_root() {
    use draw_rs::HostDocument;

    let config = SurfaceConfig::new(200.0, 100.0).with_view_box(0.0, 0.0, 400.0, 200.0);
    let mut surface = Surface::new(MemoryDocument::new(), config).expect("surface");
    assert_eq!(surface.document().attribute(surface.root(), "viewBox"), Some("0 0 400 200"));

    surface.set_view_box(-5.0, 2.5, 100.0, 50.0).expect("view box");
    assert_eq!(surface.document().attribute(surface.root(), "viewBox"), Some("-5 2.5 100 50"));
    assert_eq!(surface.config().view_box, Some([-5.0, 2.5, 100.0, 50.0]));

    assert!(surface.set_view_box(f64::NAN, 0.0, 1.0, 1.0).is_err());
    assert_eq!(surface.document().attribute(surface.root(), "viewBox"), Some("-5 2.5 100 50"));
}

#[test]
fn view_box_is_omitted_from_json_when_unset() {
    let json = SurfaceConfig::default().to_json_pretty().expect("serialize");
    assert!(!json.contains("view_box"));
}
