extern crate wound_detect;

use image::{Rgb, RgbImage};
use wound_detect::detection_runners::shared;
use wound_detect::{format_for_llm, has_context, has_detections, run_pipeline, ImageSource, PipelineConfig};

use fake_engines::{init_logs, ScriptedEngine};

fn photo() -> ImageSource {
    RgbImage::from_pixel(48, 32, Rgb([200, 160, 140])).into()
}

#[tokio::test]
async fn nothing_found() {
    init_logs();
    // Below the 0.5 default threshold.
    let engine = shared(ScriptedEngine::new(vec![vec![(16., 16., 8., 8., 2, 0.3)], vec![]]));

    let result = run_pipeline(&engine, vec![photo(), photo()], &PipelineConfig::default(), None)
        .await
        .unwrap();

    assert_eq!(result.successful_images, 2);
    assert_eq!(result.total_detections, 0);
    assert!(result.summary.highest_confidence.is_none());
    assert!(result.summary.by_class.is_empty());
    assert_eq!(result.summary.average_confidence, 0.0);

    let text = format_for_llm(&result);
    assert!(text.contains("analyzed the provided image(s) but did not detect any injuries"));
    assert!(!text.contains("Unable to analyze"));
    assert!(has_context(Some(&result)));
}

#[tokio::test]
async fn nothing_analyzed() {
    let engine = shared(ScriptedEngine::new(vec![]));
    let broken = ImageSource::Bytes(b"not an image".to_vec());
    let missing = ImageSource::from("does/not/exist.jpg");

    let result = run_pipeline(&engine, vec![broken, missing], &PipelineConfig::default(), None)
        .await
        .unwrap();

    assert_eq!(result.successful_images, 0);
    assert_eq!(result.failed_images, 2);
    assert!(result.results.iter().all(|r| r.error().is_some()));

    let text = format_for_llm(&result);
    assert!(text.contains("Unable to analyze images with wound detection model."));
    assert!(!text.contains("did not detect any injuries"));
    assert!(!has_context(Some(&result)));
}

#[tokio::test]
async fn blank_photo_has_no_detections() {
    let engine = shared(ScriptedEngine::new(vec![]));
    assert!(!has_detections(&engine, photo(), &PipelineConfig::default()).await.unwrap());
}
