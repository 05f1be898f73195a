//! WAV fixtures for synthesis mocks

use std::io::Cursor;

/// Short 16-bit mono sine tone, encoded as a complete WAV file
pub fn generate_test_wav(duration_ms: u32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 8000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut buffer = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut buffer, spec).unwrap();
        let total_samples = spec.sample_rate * duration_ms / 1000;
        for i in 0..total_samples {
            let t = i as f32 / spec.sample_rate as f32;
            let sample = (t * 440.0 * 2.0 * std::f32::consts::PI).sin();
            writer.write_sample((sample * i16::MAX as f32 * 0.5) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    buffer.into_inner()
}
