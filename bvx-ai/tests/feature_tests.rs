//! Integration tests for feature extraction from encoded audio

mod helpers;

use bvx_ai::{AudioFormat, FeatureExtractor, FeatureLayout, FEATURE_COUNT};
use helpers::{Signal, WavFixture};

fn extract(fixture: &WavFixture) -> bvx_ai::FeatureMap {
    let bytes = fixture.to_bytes().unwrap();
    FeatureExtractor::default()
        .extract_bytes(&bytes, AudioFormat::Wav)
        .unwrap()
}

#[test]
fn test_wav_yields_full_layout_in_order() {
    let features = extract(&WavFixture::new(Signal::Vibrato(200.0, 20.0, 5.0)));

    assert_eq!(features.len(), FEATURE_COUNT);
    let names: Vec<&str> = features.names().collect();
    let layout = FeatureLayout::current();
    let expected: Vec<&str> = layout.names.iter().map(|s| s.as_str()).collect();
    assert_eq!(names, expected);
    assert!(features.iter().all(|(_, v)| v.is_finite()));
}

#[test]
fn test_noise_and_chirp_stay_finite() {
    for fixture in [
        WavFixture::new(Signal::Noise(7)),
        WavFixture::new(Signal::Chirp(100.0, 4000.0)).rate(44100),
    ] {
        let features = extract(&fixture);
        assert_eq!(features.len(), FEATURE_COUNT);
        for (name, value) in features.iter() {
            assert!(value.is_finite(), "{} is {} for {:?}", name, value, fixture.signal);
        }
    }
}

#[test]
fn test_noise_has_higher_zcr_than_tone() {
    let tone = extract(&WavFixture::new(Signal::Sine(220.0)));
    let noise = extract(&WavFixture::new(Signal::Noise(3)));
    assert!(noise.get("zcr_mean").unwrap() > tone.get("zcr_mean").unwrap());
}

#[test]
fn test_vibrato_has_more_pitch_variance_than_steady_tone() {
    let steady = extract(&WavFixture::new(Signal::Sine(220.0)));
    let vibrato = extract(&WavFixture::new(Signal::Vibrato(220.0, 30.0, 4.0)));
    assert!(vibrato.get("pitch_variance").unwrap() > steady.get("pitch_variance").unwrap());
}

#[test]
fn test_extraction_is_deterministic() {
    let fixture = WavFixture::new(Signal::Chirp(150.0, 900.0)).rate(48000).stereo();
    let a = extract(&fixture);
    let b = extract(&fixture);
    assert_eq!(a, b);
}

#[test]
fn test_silence_has_no_pitch() {
    let features = extract(&WavFixture::new(Signal::Silence));
    assert_eq!(features.get("pitch_mean"), Some(0.0));
    assert_eq!(features.get("pitch_variance"), Some(0.0));
    assert!(features.iter().all(|(_, v)| v.is_finite()));
}
