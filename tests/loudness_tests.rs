//! Loudness and true-peak verification with known signals.
//!
//! Run with:
//! ```bash
//! cargo test -p sonus --test loudness_tests
//! ```

mod helpers;

use approx::assert_abs_diff_eq;
use helpers::*;
use proptest::prelude::*;
use sonus::loudness::KWeighting;
use sonus::prelude::*;

fn mono(samples: Vec<f32>, sample_rate: f64) -> AudioBuffer {
    AudioBuffer::mono(samples, sample_rate).unwrap()
}

#[test]
fn test_k_weighting_reference_response_48k() {
    let k = KWeighting::new(48000.0).unwrap();
    assert_abs_diff_eq!(k.response_db(1000.0), 0.7, epsilon = 0.05);
    assert_abs_diff_eq!(k.response_db(4000.0), 4.0, epsilon = 0.1);
    assert_abs_diff_eq!(k.response_db(38.0), -6.0, epsilon = 0.1);
}

#[test]
fn test_k_weighting_calibrated_at_44k1() {
    let k = KWeighting::new(44100.0).unwrap();
    assert_abs_diff_eq!(k.response_db(997.0), 0.0, epsilon = RESPONSE_DB_TOLERANCE);
}

#[test]
fn test_reference_tone_reads_minus_23() {
    // A 1 kHz sine at 0.1 peak sits 0.691 dB plus the K-weighting gain away
    // from -20 dBFS RMS.
    let tone = generate_sine(1000.0, 0.1, TEST_SAMPLE_RATE, 48000 * 5);
    let report = get_lufs(&mono(tone, TEST_SAMPLE_RATE), &LoudnessOptions::default()).unwrap();
    assert_abs_diff_eq!(report.integrated, -23.0, epsilon = LU_TOLERANCE);
}

#[test]
fn test_silent_signal_end_to_end() {
    let silence = generate_silence(48000 * 5);
    let report = get_lufs(&mono(silence.clone(), TEST_SAMPLE_RATE), &LoudnessOptions::full()).unwrap();

    assert!(report.integrated < -50.0);
    assert_eq!(report.true_peak.as_ref().map(|tp| tp.max), Some(0.0));
    assert_eq!(get_true_peak(&silence, &TruePeakOptions::default()).unwrap(), 0.0);
}

#[test]
fn test_sine_end_to_end() {
    let tone = generate_sine(1000.0, 0.1, TEST_SAMPLE_RATE, 48000 * 5);
    let report = get_lufs(&mono(tone.clone(), TEST_SAMPLE_RATE), &LoudnessOptions::default()).unwrap();
    assert!(report.integrated > -40.0 && report.integrated < 0.0);

    let peak = get_true_peak(&tone, &TruePeakOptions::default()).unwrap();
    assert!(peak.is_finite());
    assert!(peak >= 0.1);
}

#[test]
fn test_gating_beats_ungated_with_leading_silence() {
    let mut signal = generate_silence(48000 * 8);
    signal.extend(generate_sine(1000.0, 0.5, TEST_SAMPLE_RATE, 48000 * 2));
    let source = mono(signal, TEST_SAMPLE_RATE);

    let gated = get_lufs(&source, &LoudnessOptions::default()).unwrap();
    let ungated = get_lufs(&source, &LoudnessOptions::default().with_gating(false)).unwrap();

    assert!(
        gated.integrated > ungated.integrated + 4.0,
        "gated {} vs ungated {}",
        gated.integrated,
        ungated.integrated
    );
}

#[test]
fn test_batch_and_streaming_agree() {
    let sample_rate = 44100.0;
    let signal: Vec<f32> = generate_noise(44100 * 6, 42).iter().map(|s| s * 0.25).collect();

    let batch = get_lufs(&mono(signal.clone(), sample_rate), &LoudnessOptions::default()).unwrap();

    let mut meter = get_lufs_realtime(sample_rate, 1, RealtimeLoudnessOptions::default()).unwrap();
    let mut reading = meter.reading();
    for chunk in signal.chunks(441) {
        reading = meter.process_mono(chunk).unwrap();
    }

    assert!(batch.integrated.is_finite());
    assert!(
        (batch.integrated - reading.integrated).abs() < PARITY_LU_TOLERANCE,
        "batch {} vs streaming {}",
        batch.integrated,
        reading.integrated
    );
}

#[test]
fn test_streaming_meter_buffer_size() {
    let mut meter = get_lufs_realtime(48000.0, 2, RealtimeLoudnessOptions::default()).unwrap();
    assert_eq!(meter.buffer_size(), 19200);

    let tone = generate_sine(1000.0, 0.1, 48000.0, 48000);
    meter.process(&[&tone[..], &tone[..]]).unwrap();
    assert!(meter.reading().momentary.is_finite());

    meter.reset();
    assert_eq!(meter.reading(), LoudnessReading::default());
}

#[test]
fn test_full_report_fields() {
    let tone = generate_sine(1000.0, 0.1, TEST_SAMPLE_RATE, 48000 * 5);
    let source = AudioBuffer::stereo(tone.clone(), tone, TEST_SAMPLE_RATE).unwrap();
    let report = get_lufs(&source, &LoudnessOptions::full()).unwrap();

    // Two identical channels sum to +3.01 LU over one.
    assert_abs_diff_eq!(report.integrated, -20.0, epsilon = 0.15);
    assert!(report.loudness_range.unwrap() < 1.0);
    let tp = report.true_peak.unwrap();
    assert_eq!(tp.per_channel.len(), 2);
    assert!(tp.max >= 0.1);
    assert_abs_diff_eq!(
        sonus::db::db_to_linear(tp.max_dbtp()),
        tp.max as f64,
        epsilon = 1e-6
    );
    let stats = report.statistics.unwrap();
    assert!(stats.relative_gated_blocks > 0);
    assert!((stats.duration - 5.0).abs() < 1e-9);
}

#[test]
fn test_invalid_loudness_input() {
    let source = mono(generate_silence(4800), TEST_SAMPLE_RATE);
    let options = LoudnessOptions::default()
        .with_true_peak(true)
        .with_true_peak_oversampling(8);
    assert!(get_lufs(&source, &options).unwrap_err().is_invalid_input());

    assert!(get_lufs_realtime(48000.0, 0, RealtimeLoudnessOptions::default()).is_err());
    assert!(get_true_peak(&[0.5], &TruePeakOptions::polyphase(8)).is_err());
}

#[test]
fn test_true_peak_exceeds_sample_peak_between_samples() {
    // Quarter-rate sine offset by 45 degrees: samples at +-0.707, crests at 1.0.
    let signal: Vec<f32> = (0..4096)
        .map(|n| (std::f32::consts::FRAC_PI_2 * n as f32 + std::f32::consts::FRAC_PI_4).sin())
        .collect();
    let peak = get_true_peak(&signal, &TruePeakOptions::polyphase(4)).unwrap();
    assert!(sample_peak(&signal) < 0.71);
    assert!(peak > 0.95, "true peak {peak}");
}

fn all_true_peak_options() -> Vec<TruePeakOptions> {
    let mut options = vec![TruePeakOptions::polyphase(2), TruePeakOptions::polyphase(4)];
    for factor in [2, 4, 8] {
        for interpolation in [Interpolation::Linear, Interpolation::Cubic, Interpolation::Sinc] {
            options.push(TruePeakOptions::interpolated(factor, interpolation));
        }
    }
    options
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_true_peak_is_at_least_sample_peak(
        signal in prop::collection::vec(-1.0f32..1.0, 1..512)
    ) {
        let floor = sample_peak(&signal);
        for options in all_true_peak_options() {
            let peak = get_true_peak(&signal, &options).unwrap();
            prop_assert!(peak >= floor, "{:?}: {} < {}", options, peak, floor);
        }
    }
}
