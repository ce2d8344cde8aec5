//! Contract Invariant Tests
//!
//! These tests verify the non-negotiable guarantees.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use photogrid_core::{
    resolve, ComposedImage, Encoding, EngineError, OutputEmitter, PhotoAsset, PlaceholderReason,
    Slot, Template, TargetProfile, TemplateCatalog,
};

fn create_emitter() -> OutputEmitter {
    OutputEmitter::new(TemplateCatalog::builtin().unwrap())
}

fn png_photo(sequence: u32, color: [u8; 4]) -> PhotoAsset {
    let img = RgbaImage::from_pixel(32, 48, Rgba(color));
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .unwrap();
    PhotoAsset::from_bytes(sequence, buf)
}

fn photos(count: u32) -> Vec<PhotoAsset> {
    (0..count)
        .map(|i| png_photo(i, [(40 * i) as u8, 90, 200, 255]))
        .collect()
}

fn template_json(id: &str, still_count: u32, slots: &str) -> String {
    format!(
        r#"{{
            "id": "{id}",
            "name": "Synthetic",
            "stillCount": {still_count},
            "price": 10,
            "aspectRatio": "4:6",
            "canvasWidth": 1200,
            "canvasHeight": 1800,
            "slots": {slots}
        }}"#
    )
}

#[test]
fn invariant_resolved_slots_match_still_count_and_stay_in_bounds() {
    let catalog = TemplateCatalog::builtin().unwrap();
    for template in catalog.list_all() {
        for (w, h) in [(400, 600), (1200, 1800), (37, 113), (2400, 3600)] {
            let geometry = resolve(template, w, h).unwrap();
            assert_eq!(geometry.slots.len(), template.still_count as usize, "{}", template.id);
            for slot in &geometry.slots {
                assert!(slot.rect.right() <= w, "{} {} at {}x{}", template.id, slot.slot_id, w, h);
                assert!(slot.rect.bottom() <= h, "{} {} at {}x{}", template.id, slot.slot_id, w, h);
            }
        }
    }
}

#[test]
fn invariant_relative_geometry_independent_of_resolution() {
    let catalog = TemplateCatalog::builtin().unwrap();
    for template in catalog.list_all() {
        let aspect = f64::from(template.canvas_height) / f64::from(template.canvas_width);
        let size = |w: u32| (w, (f64::from(w) * aspect).round() as u32);
        let (w1, h1) = size(300);
        let (w2, h2) = size(1700);

        let small = resolve(template, w1, h1).unwrap();
        let large = resolve(template, w2, h2).unwrap();

        for (a, b) in small.slots.iter().zip(&large.slots) {
            assert_eq!(a.slot_id, b.slot_id);
            // offset of the larger render, measured in pixels of the smaller one
            let drift = |pa: u32, da: u32, pb: u32, db: u32| {
                let (pa, da, pb, db) = (f64::from(pa), f64::from(da), f64::from(pb), f64::from(db));
                (pa / da - pb / db).abs() * da
            };
            let (ra, rb) = (a.rect, b.rect);
            for d in [
                drift(ra.x, w1, rb.x, w2),
                drift(ra.y, h1, rb.y, h2),
                drift(ra.width, w1, rb.width, w2),
                drift(ra.height, h1, rb.height, h2),
            ] {
                assert!(d <= 1.0, "{} {}: drift {}", template.id, a.slot_id, d);
            }
        }
    }
}

#[test]
fn invariant_render_is_deterministic() {
    let emitter = create_emitter();
    let input = photos(4);
    let profile = TargetProfile::explicit(120, 180, Encoding::Raw).with_finish(true);

    let first = emitter.render("grid_4x6_2x2", &input, &profile).unwrap();
    let second = emitter.render("grid_4x6_2x2", &input, &profile).unwrap();

    assert_eq!(first.fingerprint, second.fingerprint);
    assert_eq!(first.data, second.data);
    assert!(!first.has_placeholders());
}

#[test]
fn invariant_fingerprint_tracks_photo_content() {
    let emitter = create_emitter();
    let profile = TargetProfile::explicit(40, 60, Encoding::Raw);

    let red = emitter
        .render("single_4x6", &[png_photo(0, [255, 0, 0, 255])], &profile)
        .unwrap();
    let blue = emitter
        .render("single_4x6", &[png_photo(0, [0, 0, 255, 255])], &profile)
        .unwrap();

    assert_ne!(red.fingerprint, blue.fingerprint);
}

#[test]
fn invariant_short_photo_list_degrades_to_trailing_placeholders() {
    let emitter = create_emitter();
    let profile = TargetProfile::explicit(120, 180, Encoding::Raw);

    for supplied in 0..4 {
        let image = emitter
            .render("grid_4x6_2x2", &photos(supplied), &profile)
            .unwrap();
        assert_eq!(image.missing_slots(), 4 - supplied as usize);

        let expected: Vec<String> = image.geometry.slots[supplied as usize..]
            .iter()
            .map(|s| s.slot_id.clone())
            .collect();
        assert_eq!(image.placeholder_slots(), expected);
    }
}

#[test]
fn invariant_undecodable_photo_keeps_layout() {
    let emitter = create_emitter();
    let profile = TargetProfile::explicit(60, 180, Encoding::Raw);
    let input = vec![
        png_photo(0, [10, 20, 30, 255]),
        PhotoAsset::from_bytes(1, b"not an image".to_vec()),
    ];

    let image = emitter.render("strip_2x6_2photos", &input, &profile).unwrap();

    assert_eq!(image.diagnostics.len(), 1);
    assert_eq!(image.diagnostics[0].slot_id, "s2");
    assert_eq!(image.diagnostics[0].reason, PlaceholderReason::Undecodable);
    assert!(image.diagnostics[0].detail.is_some());
    assert_eq!((image.width, image.height), (60, 180));
}

#[test]
fn invariant_unknown_template_is_not_found() {
    let emitter = create_emitter();
    for profile in [TargetProfile::preview(), TargetProfile::print(), TargetProfile::export()] {
        let result = emitter.render("does_not_exist", &photos(2), &profile);
        assert!(matches!(result, Err(EngineError::NotFound(ref id)) if id == "does_not_exist"));
    }
    assert!(emitter.render_set("does_not_exist", &[], false).is_err());
}

#[test]
fn scenario_single_4x6_without_photos() {
    let emitter = create_emitter();
    let image = emitter
        .render("single_4x6", &[], &TargetProfile::print().with_encoding(Encoding::Raw))
        .unwrap();

    assert_eq!((image.width, image.height), (1200, 1800));
    assert_eq!(image.diagnostics.len(), 1);
    assert_eq!(image.diagnostics[0].slot_id, "s1");
    assert_eq!(image.diagnostics[0].reason, PlaceholderReason::Missing);

    let pixels = image.to_rgba().unwrap();
    let neutral = Rgba([0xe5, 0xe7, 0xeb, 0xff]);
    for (x, y) in [(0, 0), (600, 900), (1199, 1799), (0, 1799)] {
        assert_eq!(*pixels.get_pixel(x, y), neutral, "pixel ({}, {})", x, y);
    }
}

#[test]
fn scenario_grid_slot_one_at_print_resolution() {
    let emitter = create_emitter();
    let geometry = emitter
        .resolve("grid_4x6_2x2", &TargetProfile::explicit(1200, 1800, Encoding::Raw))
        .unwrap();

    let s1 = geometry.slot("s1").unwrap().rect;
    assert_eq!((s1.x, s1.y), (30, 45));
    assert_eq!((s1.right(), s1.bottom()), (570, 855));
}

#[test]
fn scenario_preview_and_print_share_layout() {
    let emitter = create_emitter();
    let input = photos(4);

    for id in ["strip_2x6_4photos_duplicate", "grid_4x6_2x2"] {
        let preview = emitter.render(id, &input, &TargetProfile::preview()).unwrap();
        let print = emitter.render(id, &input, &TargetProfile::print()).unwrap();

        assert!(preview.width < print.width);
        let canvas = |img: &ComposedImage| f64::from(img.width) * f64::from(img.height);

        for (a, b) in preview.geometry.slots.iter().zip(&print.geometry.slots) {
            assert_eq!(a.slot_id, b.slot_id);
            let ra = a.rect.area() as f64 / canvas(&preview);
            let rb = b.rect.area() as f64 / canvas(&print);
            assert!((ra - rb).abs() / rb < 0.001, "{} {}: {} vs {}", id, a.slot_id, ra, rb);
        }
        assert_eq!(preview.placeholder_slots(), print.placeholder_slots());
    }
}

#[test]
fn invariant_render_set_targets_agree() {
    let emitter = create_emitter();
    let set = emitter
        .render_set("strip_2x6_2photos", &photos(1), true)
        .unwrap();

    assert_eq!(set.preview.template_id, "strip_2x6_2photos");
    assert_eq!(set.preview.placeholder_slots(), vec!["s2"]);
    assert_eq!(set.print.placeholder_slots(), vec!["s2"]);
    assert_eq!(set.export.placeholder_slots(), vec!["s2"]);

    assert!(set.preview.width < set.export.width && set.export.width < set.print.width);
    assert!(matches!(set.print.encoding, Encoding::Png));
    assert!(matches!(set.export.encoding, Encoding::Jpeg { .. }));
    assert_ne!(set.preview.fingerprint, set.print.fingerprint);
}

#[test]
fn invariant_concurrent_renders_share_catalog() {
    let emitter = create_emitter();
    let input = photos(2);
    let profile = TargetProfile::explicit(60, 180, Encoding::Raw);
    let expected = emitter
        .render("strip_2x6_2photos", &input, &profile)
        .unwrap()
        .fingerprint;

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| emitter.render("strip_2x6_2photos", &input, &profile).unwrap()))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().fingerprint, expected);
        }
    });
}

#[test]
fn invariant_catalog_rejects_invalid_template() {
    let valid: Template = serde_json::from_str(&template_json(
        "ok",
        1,
        r#"[{ "id": "s1", "x": 0, "y": 0, "width": 100, "height": 100 }]"#,
    ))
    .unwrap();
    let out_of_bounds: Template = serde_json::from_str(&template_json(
        "overflow",
        1,
        r#"[{ "id": "s1", "x": 60, "y": 0, "width": 50, "height": 100 }]"#,
    ))
    .unwrap();

    let result = TemplateCatalog::from_templates(vec![valid.clone(), out_of_bounds]);
    assert!(matches!(result, Err(EngineError::InvalidTemplate { ref id, .. }) if id == "overflow"));

    let mut short = valid.clone();
    short.id = "short".to_string();
    short.still_count = 2;
    assert!(TemplateCatalog::from_templates(vec![valid.clone(), short]).is_err());

    let mut duplicate_slots = valid.clone();
    duplicate_slots.id = "dupe".to_string();
    duplicate_slots.still_count = 2;
    duplicate_slots.slots.push(Slot {
        id: "s1".to_string(),
        ..valid.slots[0].clone()
    });
    assert!(TemplateCatalog::from_templates(vec![duplicate_slots]).is_err());

    assert!(TemplateCatalog::from_templates(vec![valid.clone(), valid]).is_err());
}

#[test]
fn invariant_bad_file_fails_whole_directory_load() {
    let dir = tempfile::tempdir().unwrap();
    let slots = r#"[{ "id": "s1", "x": 5, "y": 5, "width": 90, "height": 90 }]"#;
    std::fs::write(dir.path().join("a.json"), template_json("a", 1, slots)).unwrap();
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let catalog = TemplateCatalog::load_from_dir(dir.path()).unwrap();
    assert_eq!(catalog.len(), 1);
    assert!(catalog.get_by_id("a").is_ok());

    std::fs::write(dir.path().join("b.json"), template_json("b", 3, slots)).unwrap();
    assert!(TemplateCatalog::load_from_dir(dir.path()).is_err());

    std::fs::write(dir.path().join("b.json"), "{ not json").unwrap();
    assert!(TemplateCatalog::load_from_dir(dir.path()).is_err());
}

#[test]
fn invariant_geometry_frozen_under_published_id() {
    let published = TemplateCatalog::builtin().unwrap();

    let mut templates: Vec<Template> = published.list_all().into_iter().cloned().collect();
    for t in &mut templates {
        t.price += 20;
        t.name = format!("{} (promo)", t.name);
        t.is_enabled = false;
        t.sort_order += 10;
        t.updated_at = chrono::Utc::now();
    }
    let relabelled = TemplateCatalog::from_templates(templates.clone()).unwrap();
    assert!(relabelled.ensure_geometry_frozen(&published).is_ok());
    assert!(relabelled.list_enabled(None).is_empty());
    assert!(relabelled.get_by_id("grid_4x6_2x2").is_ok());

    let edits: [fn(&mut Template); 5] = [
        |t| t.slots[0].x = 3.0,
        |t| t.background_color = Some("#000000".to_string()),
        |t| t.background_image = Some("frame.png".to_string()),
        |t| t.aspect_ratio = photogrid_core::AspectRatio::Square,
        |t| t.preview_type = photogrid_core::PreviewType::Collage,
    ];
    for edit in edits {
        let mut changed = templates.clone();
        let grid = changed.iter_mut().find(|t| t.id == "grid_4x6_2x2").unwrap();
        edit(grid);
        let catalog = TemplateCatalog::from_templates(changed).unwrap();
        let err = catalog.ensure_geometry_frozen(&published).unwrap_err();
        assert!(matches!(err, EngineError::InvalidTemplate { ref id, .. } if id == "grid_4x6_2x2"));
    }
}

#[test]
fn invariant_fingerprint_tracks_render_config() {
    let profile = TargetProfile::explicit(40, 60, Encoding::Raw);
    let neutral = create_emitter().render("single_4x6", &[], &profile).unwrap();
    let red = create_emitter()
        .with_config(photogrid_core::RenderConfig {
            placeholder_color: "#ff0000".to_string(),
            ..Default::default()
        })
        .render("single_4x6", &[], &profile)
        .unwrap();

    assert_ne!(neutral.data, red.data);
    assert_ne!(neutral.fingerprint, red.fingerprint);
}

#[test]
fn invariant_encoded_outputs_decode_to_target_size() {
    let emitter = create_emitter();
    let input = photos(2);

    for encoding in [Encoding::Png, Encoding::jpeg()] {
        let image = emitter
            .render("strip_2x6_2photos", &input, &TargetProfile::explicit(50, 150, encoding))
            .unwrap();
        let decoded = image::load_from_memory(&image.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (50, 150));
    }
}
