use std::{sync::Arc, time::Duration};

use bytes::BytesMut;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{
    chimege::SpeechBackend,
    normalizer::{forbidden_chars, TextNormalizer},
    structs::{audio_result::AudioResult, synthesis_options::SynthesisOptions},
};
use crate::{
    errors::{constants::*, validation, GenError, Result},
    storage::ObjectStore,
    utils::{pause, units, RetryPolicy, RetryVerdict},
};

const SERVICE: &str = "chimege";
const SENTENCE_TERMINATORS: [char; 3] = ['.', '!', '?'];

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Sentences with their terminators kept, trimmed, empty ones dropped.
fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut current = String::new();
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        current.push(c);
        let ends_sentence = SENTENCE_TERMINATORS.contains(&c)
            && !chars
                .peek()
                .is_some_and(|next| SENTENCE_TERMINATORS.contains(next));
        if ends_sentence {
            sentences.push(std::mem::take(&mut current));
        }
    }
    sentences.push(current);

    sentences
        .into_iter()
        .map(|sentence| sentence.trim().to_string())
        .filter(|sentence| !sentence.is_empty())
        .collect()
}

/// Words of an oversized sentence; a single word longer than `max_chars` is
/// cut into `max_chars` pieces.
fn split_words(sentence: &str, max_chars: usize) -> Vec<String> {
    sentence
        .split_whitespace()
        .flat_map(|word| {
            let chars: Vec<char> = word.chars().collect();
            chars
                .chunks(max_chars)
                .map(|piece| piece.iter().collect::<String>())
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Split narration into pieces of at most `max_chars` characters. Sentences
/// are kept whole when they fit; joining the pieces with a space gives back
/// the narration with its whitespace collapsed.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();

    let mut push_piece = |piece: String, chunks: &mut Vec<String>| {
        if current.is_empty() {
            current = piece;
        } else if char_len(&current) + 1 + char_len(&piece) <= max_chars {
            current.push(' ');
            current.push_str(&piece);
        } else {
            chunks.push(std::mem::replace(&mut current, piece));
        }
    };

    for sentence in split_sentences(text) {
        let sentence = sentence.split_whitespace().collect::<Vec<_>>().join(" ");
        if char_len(&sentence) <= max_chars {
            push_piece(sentence, &mut chunks);
        } else {
            for word in split_words(&sentence, max_chars) {
                push_piece(word, &mut chunks);
            }
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

pub struct AudioSynthesizer {
    backend: Arc<dyn SpeechBackend>,
    normalizer: TextNormalizer,
    time_unit: Duration,
}

impl AudioSynthesizer {
    pub fn new(backend: Arc<dyn SpeechBackend>) -> Self {
        Self {
            backend,
            normalizer: TextNormalizer::new(),
            time_unit: Duration::from_millis(DEFAULT_TIME_UNIT_MS),
        }
    }

    pub fn with_time_unit(mut self, time_unit: Duration) -> Self {
        self.time_unit = time_unit;
        self
    }

    /// Clean `text`, synthesize it once and check the body looks like audio.
    #[tracing::instrument(skip(self, text, options), fields(chars = text.chars().count()))]
    pub async fn text_to_speech(
        &self,
        text: &str,
        options: &SynthesisOptions,
    ) -> Result<AudioResult> {
        let cleaned = self.normalizer.normalize(text);
        let original_preview: String = text.chars().take(100).collect();
        let cleaned_preview: String = cleaned.chars().take(100).collect();
        info!(
            original = %original_preview,
            cleaned = %cleaned_preview,
            length = char_len(&cleaned),
            "Prepared text for synthesis"
        );

        let forbidden = forbidden_chars(&cleaned);
        if !forbidden.is_empty() {
            error!(chars = ?forbidden, "Forbidden characters found");
            return Err(GenError::InvalidCharacters { chars: forbidden });
        }

        let buffer = self.backend.synthesize(&cleaned, options).await?;

        if buffer.len() < MIN_AUDIO_BYTES {
            let body = String::from_utf8_lossy(&buffer).into_owned();
            error!(size = buffer.len(), body = %body, "Response too small, might be error");
            return Err(GenError::invalid_response(
                SERVICE,
                format!("Invalid audio response from API: {}", body),
            ));
        }

        info!(size = buffer.len(), format = "wav", "Audio generated successfully");
        Ok(AudioResult::wav(buffer))
    }

    /// Synthesize long narration chunk by chunk and join the audio in order.
    /// The first failing chunk fails the whole narration.
    #[tracing::instrument(skip(self, narration, options), fields(chars = narration.chars().count()))]
    pub async fn generate_from_script(
        &self,
        narration: &str,
        options: &SynthesisOptions,
    ) -> Result<AudioResult> {
        validation::validate_narration(narration)?;

        let chunks = split_into_chunks(narration, MAX_CHUNK_CHARS);
        if let [only] = chunks.as_slice() {
            return self.text_to_speech(only, options).await;
        }

        let mut merged = BytesMut::new();
        for (index, chunk) in chunks.iter().enumerate() {
            info!("Generating audio chunk {}/{}", index + 1, chunks.len());

            let result = self.text_to_speech(chunk, options).await.map_err(|e| {
                error!(chunk = index + 1, error = %e, "Script audio generation failed");
                e
            })?;
            merged.extend_from_slice(&result.buffer);

            if index + 1 < chunks.len() {
                pause(units(self.time_unit, CHUNK_PAUSE_UNITS)).await;
            }
        }

        Ok(AudioResult::wav(merged.freeze()))
    }

    fn classify(error: &GenError) -> RetryVerdict {
        if error.is_rate_limited() {
            RetryVerdict::Backoff
        } else if error.is_precondition() {
            RetryVerdict::Abort
        } else {
            RetryVerdict::Pause
        }
    }

    /// [`Self::text_to_speech`] with up to `max_retries` attempts.
    pub async fn generate_with_retry(
        &self,
        text: &str,
        options: &SynthesisOptions,
        max_retries: u32,
    ) -> Result<AudioResult> {
        RetryPolicy::new(max_retries, self.time_unit)
            .attempt(
                "audio generation",
                |attempt| {
                    info!("Audio generation attempt {}/{}", attempt, max_retries);
                    self.text_to_speech(text, options)
                },
                Self::classify,
            )
            .await
    }

    /// Synthesize the narration and store it as a uniquely named `.wav`.
    /// Returns the public URL.
    #[tracing::instrument(skip(self, narration, options, store))]
    pub async fn generate_and_upload(
        &self,
        narration: &str,
        options: &SynthesisOptions,
        store: &dyn ObjectStore,
        folder: &str,
    ) -> Result<String> {
        let audio = self.generate_from_script(narration, options).await?;
        let filename = format!("narration-{}.{}", Uuid::new_v4(), audio.format.extension());

        let url = store
            .upload_buffer(audio.buffer, &filename, folder)
            .await
            .map_err(|e| {
                warn!(filename = %filename, error = %e, "Audio upload failed");
                e
            })?;

        info!(url = %url, "Audio uploaded");
        Ok(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{audio::chimege::MockSpeechBackend, storage::MockObjectStore};
    use bytes::Bytes;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn synthesizer(mock: MockSpeechBackend) -> AudioSynthesizer {
        AudioSynthesizer::new(Arc::new(mock)).with_time_unit(Duration::from_millis(1))
    }

    /// Fake audio: a fixed header padded past the size check, then the text.
    fn fake_audio(text: &str) -> Bytes {
        let mut audio = vec![0u8; MIN_AUDIO_BYTES];
        audio.extend_from_slice(text.as_bytes());
        Bytes::from(audio)
    }

    fn long_narration() -> String {
        let sentence = "Шөнө дунд хаалга аажуухан нээгдэв. ";
        sentence.repeat(1200 / sentence.chars().count() + 1)
    }

    #[test]
    fn test_split_sentences_keeps_terminators() {
        assert_eq!(
            split_sentences("Нэг. Хоёр!? Гурав"),
            vec!["Нэг.", "Хоёр!?", "Гурав"]
        );
        assert!(split_sentences("  ").is_empty());
    }

    #[test]
    fn test_short_text_is_one_chunk() {
        assert_eq!(
            split_into_chunks("Нэг.  Хоёр.", 500),
            vec!["Нэг. Хоёр."]
        );
        assert!(split_into_chunks("", 500).is_empty());
    }

    #[test]
    fn test_chunks_are_bounded_and_ordered() {
        let narration = long_narration();
        assert!(narration.chars().count() >= 1200);

        let chunks = split_into_chunks(&narration, 500);

        assert!(chunks.len() >= 3);
        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 500));
        assert!(chunks.iter().all(|chunk| chunk.ends_with('.')));
        assert_eq!(chunks.join(" "), narration.trim());
    }

    #[test]
    fn test_oversized_sentence_splits_on_words() {
        let sentence = "үг ".repeat(30);
        let chunks = split_into_chunks(&sentence, 20);

        assert!(chunks.iter().all(|chunk| chunk.chars().count() <= 20));
        assert_eq!(chunks.join(" "), sentence.trim());
    }

    #[test]
    fn test_oversized_word_is_cut() {
        let word = "а".repeat(12);
        let chunks = split_into_chunks(&word, 5);
        assert_eq!(chunks, vec!["ааааа", "ааааа", "аа"]);
    }

    #[tokio::test]
    async fn test_text_to_speech_sends_cleaned_text() {
        let mut mock = MockSpeechBackend::new();
        mock.expect_synthesize()
            .withf(|text, options| text == "Сайн байна уу" && options.voice_id == "MALE1")
            .times(1)
            .returning(|text, _| Ok(fake_audio(text)));

        let result = synthesizer(mock)
            .text_to_speech("Сайн   байна уу?! :)", &SynthesisOptions::default())
            .await
            .unwrap();

        assert_eq!(result.format.extension(), "wav");
        assert!(result.buffer.len() >= MIN_AUDIO_BYTES);
    }

    #[tokio::test]
    async fn test_emoji_only_text_sends_fallback_sentence() {
        let mut mock = MockSpeechBackend::new();
        mock.expect_synthesize()
            .withf(|text, _| text == EMPTY_TEXT_FALLBACK)
            .times(1)
            .returning(|text, _| Ok(fake_audio(text)));

        let result = synthesizer(mock)
            .text_to_speech("👻🎃", &SynthesisOptions::default())
            .await
            .unwrap();
        assert!(!result.is_empty());
    }

    #[tokio::test]
    async fn test_undersized_body_is_invalid_response() {
        let mut mock = MockSpeechBackend::new();
        mock.expect_synthesize()
            .times(1)
            .returning(|_, _| Ok(Bytes::from_static(b"invalid token")));

        let error = synthesizer(mock)
            .text_to_speech("Сайн", &SynthesisOptions::default())
            .await
            .unwrap_err();

        match error {
            GenError::InvalidResponse { message, .. } => assert!(message.contains("invalid token")),
            other => panic!("Expected InvalidResponse, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_from_script_merges_in_order() {
        let narration = long_narration();
        let expected_chunks = split_into_chunks(&narration, MAX_CHUNK_CHARS);

        let mut mock = MockSpeechBackend::new();
        mock.expect_synthesize()
            .times(expected_chunks.len())
            .returning(|text, _| Ok(fake_audio(text)));

        let result = synthesizer(mock)
            .generate_from_script(&narration, &SynthesisOptions::default())
            .await
            .unwrap();

        let normalizer = TextNormalizer::new();
        let mut expected = Vec::new();
        for chunk in &expected_chunks {
            expected.extend_from_slice(&fake_audio(&normalizer.normalize(chunk)));
        }
        assert_eq!(result.buffer.as_ref(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_generate_from_script_aborts_on_failed_chunk() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut mock = MockSpeechBackend::new();
        mock.expect_synthesize().returning(move |text, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                Err(GenError::transport(SERVICE, Some(500), "boom"))
            } else {
                Ok(fake_audio(text))
            }
        });

        let result = synthesizer(mock)
            .generate_from_script(&long_narration(), &SynthesisOptions::default())
            .await;

        assert!(matches!(result, Err(GenError::Transport { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_generate_from_script_requires_text() {
        let synthesizer = synthesizer(MockSpeechBackend::new());
        assert!(matches!(
            synthesizer
                .generate_from_script("  ", &SynthesisOptions::default())
                .await,
            Err(GenError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_generate_with_retry_rate_limited_exhausts() {
        let mut mock = MockSpeechBackend::new();
        mock.expect_synthesize()
            .times(3)
            .returning(|_, _| Err(GenError::transport(SERVICE, Some(429), "rate limited")));

        let error = synthesizer(mock)
            .generate_with_retry("Сайн", &SynthesisOptions::default(), 3)
            .await
            .unwrap_err();

        match error {
            GenError::GenerationExhausted {
                attempts, source, ..
            } => {
                assert_eq!(attempts, 3);
                assert!(source.is_rate_limited());
            }
            other => panic!("Expected GenerationExhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_generate_with_retry_recovers() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut mock = MockSpeechBackend::new();
        mock.expect_synthesize().times(2).returning(move |text, _| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(GenError::transport(SERVICE, Some(502), "bad gateway"))
            } else {
                Ok(fake_audio(text))
            }
        });

        let result = synthesizer(mock)
            .generate_with_retry("Сайн", &SynthesisOptions::default(), 3)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_generate_and_upload_returns_url() {
        let mut speech = MockSpeechBackend::new();
        speech
            .expect_synthesize()
            .times(1)
            .returning(|text, _| Ok(fake_audio(text)));

        let mut store = MockObjectStore::new();
        store
            .expect_upload_buffer()
            .withf(|buffer, filename, folder| {
                buffer.len() >= MIN_AUDIO_BYTES
                    && filename.starts_with("narration-")
                    && filename.ends_with(".wav")
                    && folder == "audio"
            })
            .times(1)
            .returning(|_, filename, _| Ok(format!("https://cdn/audio/{}", filename)));

        let url = synthesizer(speech)
            .generate_and_upload("Сайн байна уу.", &SynthesisOptions::default(), &store, AUDIO_FOLDER)
            .await
            .unwrap();
        assert!(url.starts_with("https://cdn/audio/narration-"));
    }
}
