mod common;

use std::sync::Arc;

use image::{imageops, Rgb, RgbImage};
use marksman::annotate::{ALTERNATE_COLOR, PRIMARY_COLOR};
use marksman::core::FramePoint;
use marksman::detect::{BoundingBox, Detection, Detector, ReplayDetector};
use marksman::features::{Registrar, RegistrationFailure};
use marksman::{
    PipelineContext, ReferenceAsset, Resolution, ShotError, ShotPipeline, ShotRequest,
    TrainerConfig,
};

use common::{blocks, bullseye, config, frame_with, full_mask, upscaled_centre, write_assets};

fn asset(
    cfg: &TrainerConfig,
    name: &str,
    reference: RgbImage,
    alternate: Option<RgbImage>,
) -> ReferenceAsset {
    let registrar = Registrar::new(cfg.registration.clone());
    let mask = full_mask(reference.width(), reference.height());
    ReferenceAsset::from_images(name, reference, alternate, &mask, bullseye(), &registrar)
        .expect("asset")
}

fn pipeline(
    cfg: &TrainerConfig,
    detections: Vec<Detection>,
    assets: Vec<ReferenceAsset>,
) -> ShotPipeline {
    let detector: Arc<dyn Detector> = Arc::new(ReplayDetector::new(detections));
    let ctx = PipelineContext::from_assets(cfg, detector, assets);
    ShotPipeline::new(Arc::new(ctx)).expect("pipeline")
}

#[test]
fn upscaled_centre_scores_bullseye_on_primary() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path(), &["bia_so_4"]);
    let reference = blocks(320, 240, 3);
    let crop = upscaled_centre(&reference);
    let (frame, det) = frame_with(&crop, 150, 100, "bia_so_4");

    let pipeline = pipeline(&cfg, vec![det], vec![asset(&cfg, "bia_so_4", reference, None)]);
    let aim = FramePoint::new(150.0 + 160.0, 100.0 + 120.0);
    let result = pipeline
        .process_shot(&ShotRequest::new(frame).with_aim(aim))
        .expect("scored");

    assert_eq!(result.resolution, Resolution::Primary);
    assert_eq!(result.target.as_deref(), Some("bia_so_4"));
    assert_eq!(result.score, 10);
    let p = result.coordinates.expect("coordinates");
    assert!((p.x - 160.0).abs() <= 3.0 && (p.y - 120.0).abs() <= 3.0, "{p:?}");
    assert!(result.failed_attempts.is_empty());
    assert_eq!(result.annotated.dimensions(), (320, 240));
    assert_eq!(
        result.annotated.get_pixel(p.x.floor() as u32, p.y.floor() as u32),
        &PRIMARY_COLOR
    );
}

#[test]
fn crop_of_alternate_reference_resolves_on_alternate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path(), &["bia_so_7"]);
    let primary = blocks(320, 240, 3);
    let alternate = blocks(320, 240, 11);
    let crop = imageops::crop_imm(&alternate, 60, 50, 200, 160).to_image();
    let (frame, det) = frame_with(&crop, 100, 100, "bia_so_7");

    let pipeline = pipeline(
        &cfg,
        vec![det],
        vec![asset(&cfg, "bia_so_7", primary, Some(alternate))],
    );
    let aim = FramePoint::new(100.0 + 100.0, 100.0 + 80.0);
    let result = pipeline
        .process_shot(&ShotRequest::new(frame).with_aim(aim))
        .expect("scored");

    assert_eq!(result.resolution, Resolution::Alternate, "{:?}", result.failed_attempts);
    assert_eq!(result.failed_attempts.len(), 1);
    let p = result.coordinates.expect("coordinates");
    assert!((p.x - 160.0).abs() <= 1.5 && (p.y - 130.0).abs() <= 1.5, "{p:?}");
    // (160, 130) is 10px from the centre of the 320x240 alternate.
    assert_eq!(result.score, 10);
    assert_eq!(
        result.annotated.get_pixel(p.x.floor() as u32, p.y.floor() as u32),
        &ALTERNATE_COLOR
    );
}

#[test]
fn featureless_crop_cascades_to_linear_fallback() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path(), &["bia_so_8"]);
    let black = RgbImage::new(160, 120);
    let (frame, det) = frame_with(&black, 200, 150, "bia_so_8");

    let pipeline = pipeline(
        &cfg,
        vec![det],
        vec![asset(
            &cfg,
            "bia_so_8",
            blocks(320, 240, 3),
            Some(blocks(320, 240, 5)),
        )],
    );
    // Crop centre; scales by 2 onto the reference centre.
    let aim = FramePoint::new(200.0 + 80.0, 150.0 + 60.0);
    let result = pipeline
        .process_shot(&ShotRequest::new(frame).with_aim(aim))
        .expect("fallback still scores");

    assert_eq!(result.resolution, Resolution::LinearFallback);
    assert_eq!(result.failed_attempts.len(), 2);
    assert!(result
        .failed_attempts
        .iter()
        .all(|f| matches!(f, RegistrationFailure::TooFewKeypoints { crop: 0, .. })));
    let p = result.coordinates.expect("fallback point");
    assert_eq!((p.x, p.y), (160.0, 120.0));
    assert_eq!(result.score, 10);
}

#[test]
fn shot_outside_every_box_is_a_complete_miss() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path(), &["bia_so_4"]);
    let reference = blocks(320, 240, 3);
    let (frame, det) = frame_with(&upscaled_centre(&reference), 150, 100, "bia_so_4");
    let pipeline = pipeline(&cfg, vec![det], vec![asset(&cfg, "bia_so_4", reference, None)]);

    for aim in [
        FramePoint::new(10.0, 10.0),
        FramePoint::new(149.9, 200.0),
        FramePoint::new(639.0, 479.0),
    ] {
        let result = pipeline
            .process_shot(&ShotRequest::new(frame.clone()).with_aim(aim))
            .expect("miss is a result");
        assert_eq!(result.score, 0);
        assert_eq!(result.resolution, Resolution::Miss);
        assert!(result.coordinates.is_none());
        assert!(result.target.is_none());
        assert_eq!(result.annotated.dimensions(), (640, 480));
    }
}

#[test]
fn missing_assets_only_disable_their_target() {
    let dir = tempfile::tempdir().expect("tempdir");
    let reference = blocks(320, 240, 3);
    write_assets(dir.path(), "bia_so_4", &reference);
    let cfg = config(dir.path(), &["bia_so_4", "bia_so_8"]);

    let crop = upscaled_centre(&reference);
    let (frame, hit_4) = frame_with(&crop, 0, 0, "bia_so_4");
    let hit_8 = Detection::new("bia_so_8", 0.95, BoundingBox::new(400.0, 300.0, 600.0, 450.0));

    let detector: Arc<dyn Detector> = Arc::new(ReplayDetector::new(vec![hit_4, hit_8]));
    let ctx = Arc::new(PipelineContext::load(&cfg, detector));
    assert_eq!(ctx.ready_targets(), vec!["bia_so_4"]);
    let pipeline = ShotPipeline::new(ctx).expect("pipeline");

    let ok = pipeline
        .process_shot(&ShotRequest::new(frame.clone()).with_aim(FramePoint::new(160.0, 120.0)))
        .expect("bia_so_4 scores");
    assert_eq!(ok.resolution, Resolution::Primary);
    assert_eq!(ok.score, 10);

    let err = pipeline
        .process_shot(&ShotRequest::new(frame).with_aim(FramePoint::new(500.0, 400.0)))
        .unwrap_err();
    assert!(
        matches!(&err, ShotError::TargetUnavailable { target, .. } if target == "bia_so_8"),
        "{err:?}"
    );
}

#[test]
fn scoring_is_repeatable() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path(), &["bia_so_4"]);
    let reference = blocks(320, 240, 3);
    let crop = imageops::crop_imm(&reference, 40, 30, 220, 170).to_image();
    let (frame, det) = frame_with(&crop, 50, 50, "bia_so_4");
    let pipeline = pipeline(&cfg, vec![det], vec![asset(&cfg, "bia_so_4", reference, None)]);

    let request = ShotRequest::new(frame).with_aim(FramePoint::new(150.0, 120.0));
    let a = pipeline.process_shot(&request).expect("first");
    let b = pipeline.process_shot(&request).expect("second");
    assert_eq!(a.coordinates, b.coordinates);
    assert_eq!(a.score, b.score);
    assert_eq!(a.resolution, b.resolution);
    assert_eq!(a.annotated, b.annotated);
}

#[test]
fn frame_border_boxes_are_clamped_before_cropping() {
    let dir = tempfile::tempdir().expect("tempdir");
    let cfg = config(dir.path(), &["bia_so_4"]);
    let reference = blocks(320, 240, 3);
    let frame = RgbImage::from_pixel(640, 480, Rgb([60, 60, 60]));
    let det = Detection::new("bia_so_4", 0.5, BoundingBox::new(-40.0, -20.0, 100.0, 90.0));
    let pipeline = pipeline(&cfg, vec![det], vec![asset(&cfg, "bia_so_4", reference, None)]);

    let result = pipeline
        .process_shot(&ShotRequest::new(frame).with_aim(FramePoint::new(50.0, 45.0)))
        .expect("scored");
    // A flat crop cannot register: linear fallback over the clamped 100x90 crop.
    assert_eq!(result.resolution, Resolution::LinearFallback);
    let p = result.coordinates.expect("point");
    assert!((p.x - 50.0 * 320.0 / 100.0).abs() < 1e-3);
    assert!((p.y - 45.0 * 240.0 / 90.0).abs() < 1e-3);
}
