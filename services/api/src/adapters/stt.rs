//! services/api/src/adapters/stt.rs
//!
//! This module contains the adapter for OpenAI's Speech-to-Text (Whisper) service.
//! It implements the `SpeechToTextService` port from the `core` crate.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::audio::{AudioInput, CreateTranscriptionRequest},
    Client,
};
use async_trait::async_trait;
use hound::{WavSpec, WavWriter};
use visual_journal_core::ports::{PortError, PortResult, SpeechToTextService};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `SpeechToTextService` port using the OpenAI Whisper API.
#[derive(Clone)]
pub struct OpenAiSttAdapter {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiSttAdapter {
    /// Creates a new `OpenAiSttAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String) -> Self {
        Self { client, model }
    }

    /// Wraps a raw little-endian PCM16 mono capture into a WAV container,
    /// which is what the transcription endpoint expects for raw microphone
    /// streams.
    fn pcm16_to_wav(pcm_data: &[u8], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
        let mut cursor = std::io::Cursor::new(Vec::new());

        let spec = WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut writer = WavWriter::new(&mut cursor, spec)?;

        for chunk in pcm_data.chunks_exact(2) {
            let sample = i16::from_le_bytes([chunk[0], chunk[1]]);
            writer.write_sample(sample)?;
        }

        writer.finalize()?;
        Ok(cursor.into_inner())
    }

    /// (filename, payload) for the upload. Browser recordings (webm/ogg/wav)
    /// pass through untouched; raw PCM gets containerized first.
    fn prepare_upload(audio_data: &[u8], mime: &str) -> PortResult<(String, Vec<u8>)> {
        match mime {
            "audio/pcm" | "audio/l16" => {
                let wav = Self::pcm16_to_wav(audio_data, 48_000)
                    .map_err(|e| PortError::Unexpected(format!("Failed to encode WAV: {}", e)))?;
                Ok(("voice_note.wav".to_string(), wav))
            }
            other => {
                let extension = other.split('/').nth(1).unwrap_or("webm");
                Ok((format!("voice_note.{}", extension), audio_data.to_vec()))
            }
        }
    }
}

//=========================================================================================
// `SpeechToTextService` Trait Implementation
//=========================================================================================

#[async_trait]
impl SpeechToTextService for OpenAiSttAdapter {
    /// Transcribes a recorded voice note using the configured Whisper model.
    async fn transcribe_audio(&self, audio_data: &[u8], mime: &str) -> PortResult<String> {
        let (filename, payload) = Self::prepare_upload(audio_data, mime)?;
        let input = AudioInput::from_vec_u8(filename, payload);

        let request = CreateTranscriptionRequest {
            file: input,
            model: self.model.clone(),
            ..Default::default()
        };

        // Call the API and manually map the error, which respects the orphan rule.
        let response = self
            .client
            .audio()
            .transcription()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::Unexpected(e.to_string()))?;

        Ok(response.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pcm_capture_is_wrapped_into_a_wav_container() {
        let pcm: Vec<u8> = [0i16, 1000, -1000, 32767]
            .iter()
            .flat_map(|s| s.to_le_bytes())
            .collect();
        let (filename, payload) = OpenAiSttAdapter::prepare_upload(&pcm, "audio/pcm").unwrap();
        assert_eq!(filename, "voice_note.wav");
        assert_eq!(&payload[..4], b"RIFF");
        assert_eq!(&payload[8..12], b"WAVE");
    }

    #[test]
    fn container_formats_pass_through() {
        let (filename, payload) =
            OpenAiSttAdapter::prepare_upload(b"opus data", "audio/webm").unwrap();
        assert_eq!(filename, "voice_note.webm");
        assert_eq!(payload, b"opus data");
    }
}
