//! TTS Engine orchestrator.
//!
//! This module provides the inference session and the engine that turns
//! single and batch synthesis requests into model calls, sharing one
//! prepared clone prompt per call.

mod batch;
mod options;
mod session;
mod tts;

pub use batch::{BatchItem, BatchReport, ItemOutcome};
pub use options::{DEFAULT_OUTPUT_PREFIX, MAX_NEW_TOKENS_LIMIT, SynthesisOptions};
pub use session::{InferenceSession, ModelConfig};
pub use tts::{TTSEngine, TTSError};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{
        BackendError, ClonePrompt, GenerateRequest, GeneratedAudio, HealthResponse, MockBackend,
    };
    use crate::voice::{ResolvedVoice, VoiceResolver, VoiceSpec};
    use mockall::predicate::eq;
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn health(cuda_available: bool) -> HealthResponse {
        let device = if cuda_available { "cuda:0" } else { "cpu" };
        HealthResponse {
            status: "healthy".to_string(),
            cuda_available,
            gpu: cuda_available.then(|| "NVIDIA RTX 4090".to_string()),
            total_memory_gb: cuda_available.then_some(23.6),
            device: device.to_string(),
            model_loaded: false,
        }
    }

    fn audio() -> GeneratedAudio {
        GeneratedAudio {
            waveforms: vec![vec![0.0, 0.25, -0.25, 0.5]],
            sample_rate: 24000,
        }
    }

    /// Mock that passes the accelerator check and loads once.
    fn ready_backend() -> MockBackend {
        let mut mock = MockBackend::new();
        mock.expect_health().times(1).returning(|| Ok(health(true)));
        mock.expect_load_model().times(1).returning(|_| {
            Ok(HealthResponse {
                model_loaded: true,
                ..health(true)
            })
        });
        mock
    }

    /// Mock prepared for one prompt `p-1`, released exactly once.
    fn backend_with_prompt() -> MockBackend {
        let mut mock = ready_backend();
        mock.expect_create_voice_clone_prompt()
            .times(1)
            .returning(|_, _, x| {
                Ok(ClonePrompt {
                    prompt_id: "p-1".to_string(),
                    x_vector_only: x,
                })
            });
        mock.expect_release_prompt()
            .with(eq("p-1"))
            .times(1)
            .returning(|_| Ok(()));
        mock
    }

    fn alice_dir() -> TempDir {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("alice.wav"), b"RIFF fake wav data").unwrap();
        std::fs::write(temp_dir.path().join("alice.txt"), "Hello there\n").unwrap();
        temp_dir
    }

    fn engine(backend: MockBackend, voices: &Path) -> TTSEngine<MockBackend> {
        let session = InferenceSession::new(backend, ModelConfig::default());
        TTSEngine::new(session, VoiceResolver::with_dir(voices.to_path_buf()))
    }

    fn alice() -> VoiceSpec {
        VoiceSpec::Named("alice".to_string())
    }

    fn file_name(path: &Path) -> &str {
        path.file_name().and_then(|n| n.to_str()).unwrap()
    }

    // ===========================================
    // InferenceSession tests
    // ===========================================

    #[test]
    fn test_session_ensure_ready_is_idempotent() {
        let mut session = InferenceSession::new(ready_backend(), ModelConfig::default());
        assert!(!session.is_ready());

        session.ensure_ready().unwrap();
        session.ensure_ready().unwrap();

        assert!(session.is_ready());
    }

    #[test]
    fn test_session_sends_model_config() {
        let mut mock = MockBackend::new();
        mock.expect_health().times(1).returning(|| Ok(health(true)));
        mock.expect_load_model()
            .withf(|req| {
                req.model_id == "Qwen/Qwen3-TTS-12Hz-0.6B-Base"
                    && req.device == "cuda"
                    && req.dtype == "float32"
                    && req.hf_endpoint.as_deref() == Some("https://hf-mirror.com")
            })
            .times(1)
            .returning(|_| Ok(health(true)));

        let mut session = InferenceSession::new(mock, ModelConfig::default());
        session.ensure_ready().unwrap();
    }

    #[test]
    fn test_session_accelerator_unavailable() {
        let mut mock = MockBackend::new();
        mock.expect_health().times(1).returning(|| Ok(health(false)));
        mock.expect_load_model().never();

        let mut session = InferenceSession::new(mock, ModelConfig::default());
        let result = session.ensure_ready();

        assert!(matches!(
            result.unwrap_err(),
            TTSError::AcceleratorUnavailable(_)
        ));
        assert!(!session.is_ready());
    }

    #[test]
    fn test_session_server_unreachable() {
        let mut mock = MockBackend::new();
        mock.expect_health().times(1).returning(|| {
            Err(BackendError::ConnectionFailed(
                "Connection refused".to_string(),
            ))
        });

        let mut session = InferenceSession::new(mock, ModelConfig::default());
        assert!(matches!(
            session.ensure_ready().unwrap_err(),
            TTSError::BackendError(BackendError::ConnectionFailed(_))
        ));
    }

    #[test]
    fn test_session_prepare_requires_ready() {
        let mut mock = MockBackend::new();
        mock.expect_create_voice_clone_prompt().never();

        let session = InferenceSession::new(mock, ModelConfig::default());
        let voice = ResolvedVoice {
            audio_path: PathBuf::from("/voices/alice.wav"),
            ref_text: Some("Hello there".to_string()),
        };

        assert!(matches!(
            session.prepare(&voice, true).unwrap_err(),
            TTSError::ModelNotLoaded
        ));
    }

    #[test]
    fn test_session_close_unloads_once() {
        let mut mock = ready_backend();
        mock.expect_unload_model().times(1).returning(|| Ok(()));

        let mut session = InferenceSession::new(mock, ModelConfig::default());
        session.ensure_ready().unwrap();

        session.close();
        session.close();
        assert!(!session.is_ready());
    }

    #[test]
    fn test_session_close_ignores_unload_failure() {
        let mut mock = ready_backend();
        mock.expect_unload_model()
            .times(1)
            .returning(|| Err(BackendError::RequestFailed("Status: 500".to_string())));

        let mut session = InferenceSession::new(mock, ModelConfig::default());
        session.ensure_ready().unwrap();
        session.close();
    }

    #[test]
    fn test_session_close_without_load_is_noop() {
        let mut mock = MockBackend::new();
        mock.expect_unload_model().never();

        let mut session = InferenceSession::new(mock, ModelConfig::default());
        session.close();
    }

    // ===========================================
    // SynthesisOptions tests
    // ===========================================

    #[test]
    fn test_options_defaults() {
        let options = SynthesisOptions::default();

        assert_eq!(options.language, "Chinese");
        assert_eq!(options.max_new_tokens, 2048);
        assert!(options.x_vector_only);
        assert_eq!(options.prefix(), DEFAULT_OUTPUT_PREFIX);
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_options_full_clone_inverts_x_vector_only() {
        assert!(!SynthesisOptions::default().with_full_clone(true).x_vector_only);
        assert!(SynthesisOptions::default().with_full_clone(false).x_vector_only);
    }

    #[test]
    fn test_options_validate_ranges() {
        let invalid = [
            SynthesisOptions::default().with_language("  "),
            SynthesisOptions::default().with_max_new_tokens(0),
            SynthesisOptions::default().with_max_new_tokens(MAX_NEW_TOKENS_LIMIT + 1),
            SynthesisOptions::default().with_output_prefix(""),
            SynthesisOptions::default().with_output_prefix("../out"),
        ];

        for options in invalid {
            assert!(
                matches!(options.validate(), Err(TTSError::InvalidArgument(_))),
                "expected invalid: {options:?}"
            );
        }

        assert!(
            SynthesisOptions::default()
                .with_max_new_tokens(MAX_NEW_TOKENS_LIMIT)
                .validate()
                .is_ok()
        );
    }

    // ===========================================
    // synthesize_one tests
    // ===========================================

    #[test]
    fn test_synthesize_one_x_vector_only_drops_transcript() {
        let voices = alice_dir();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("single.wav");

        let mut mock = ready_backend();
        let expected_audio = voices.path().join("alice.wav");
        mock.expect_create_voice_clone_prompt()
            .withf(move |path, ref_text, x_vector_only| {
                path == expected_audio.as_path() && ref_text.is_none() && *x_vector_only
            })
            .times(1)
            .returning(|_, _, x| {
                Ok(ClonePrompt {
                    prompt_id: "p-1".to_string(),
                    x_vector_only: x,
                })
            });
        mock.expect_generate_voice_clone()
            .withf(|req: &GenerateRequest| {
                req.text == "你好" && req.prompt_id == "p-1" && req.language == "Chinese"
            })
            .times(1)
            .returning(|_| Ok(audio()));
        mock.expect_release_prompt().times(1).returning(|_| Ok(()));

        let mut engine = engine(mock, voices.path());
        let options = SynthesisOptions::default().with_output_path(&output);
        let path = engine.synthesize_one("你好", &alice(), &options).unwrap();

        assert_eq!(path, output);
        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, 24000);
        assert_eq!(reader.len(), 4);
    }

    #[test]
    fn test_synthesize_one_full_clone_forwards_transcript() {
        let voices = alice_dir();
        let out_dir = TempDir::new().unwrap();

        let mut mock = ready_backend();
        mock.expect_create_voice_clone_prompt()
            .withf(|_, ref_text, x_vector_only| {
                ref_text.as_deref() == Some("Hello there") && !*x_vector_only
            })
            .times(1)
            .returning(|_, _, x| {
                Ok(ClonePrompt {
                    prompt_id: "p-1".to_string(),
                    x_vector_only: x,
                })
            });
        mock.expect_generate_voice_clone()
            .times(1)
            .returning(|_| Ok(audio()));
        mock.expect_release_prompt().times(1).returning(|_| Ok(()));

        let mut engine = engine(mock, voices.path());
        let options = SynthesisOptions::default()
            .with_full_clone(true)
            .with_output_path(out_dir.path().join("full.wav"));

        assert!(engine.synthesize_one("Hi", &alice(), &options).is_ok());
    }

    #[test]
    fn test_synthesize_one_ref_text_override() {
        let voices = alice_dir();
        let out_dir = TempDir::new().unwrap();

        let mut mock = ready_backend();
        mock.expect_create_voice_clone_prompt()
            .withf(|_, ref_text, _| ref_text.as_deref() == Some("Explicit transcript"))
            .times(1)
            .returning(|_, _, x| {
                Ok(ClonePrompt {
                    prompt_id: "p-1".to_string(),
                    x_vector_only: x,
                })
            });
        mock.expect_generate_voice_clone()
            .times(1)
            .returning(|_| Ok(audio()));
        mock.expect_release_prompt().times(1).returning(|_| Ok(()));

        let mut engine = engine(mock, voices.path());
        let options = SynthesisOptions::default()
            .with_full_clone(true)
            .with_ref_text("Explicit transcript")
            .with_output_path(out_dir.path().join("override.wav"));

        assert!(engine.synthesize_one("Hi", &alice(), &options).is_ok());
    }

    #[test]
    fn test_synthesize_one_reference_audio() {
        let refs = TempDir::new().unwrap();
        let ref_audio = refs.path().join("speaker.mp3");
        std::fs::write(&ref_audio, b"ID3 fake mp3").unwrap();

        let mut mock = backend_with_prompt();
        mock.expect_generate_voice_clone()
            .times(1)
            .returning(|_| Ok(audio()));

        let mut engine = engine(mock, refs.path());
        let options = SynthesisOptions::default().with_output_path(refs.path().join("out.wav"));

        let path = engine
            .synthesize_one("Hi", &VoiceSpec::Reference(ref_audio), &options)
            .unwrap();
        assert!(path.exists());
    }

    #[test]
    fn test_synthesize_one_temp_output() {
        let voices = alice_dir();

        let mut mock = backend_with_prompt();
        mock.expect_generate_voice_clone()
            .times(1)
            .returning(|_| Ok(audio()));

        let mut engine = engine(mock, voices.path());
        let path = engine
            .synthesize_one("Hi", &alice(), &SynthesisOptions::default())
            .unwrap();

        assert!(path.exists());
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("wav"));
        std::fs::remove_file(path).unwrap();
    }

    #[test]
    fn test_synthesize_one_empty_generation() {
        let voices = alice_dir();
        let out_dir = TempDir::new().unwrap();
        let output = out_dir.path().join("empty.wav");

        let mut mock = backend_with_prompt();
        mock.expect_generate_voice_clone()
            .times(1)
            .returning(|_| Ok(GeneratedAudio::default()));

        let mut engine = engine(mock, voices.path());
        let options = SynthesisOptions::default().with_output_path(&output);
        let result = engine.synthesize_one("Hi", &alice(), &options);

        assert!(matches!(result.unwrap_err(), TTSError::EmptyGeneration));
        assert!(!output.exists());
    }

    #[test]
    fn test_synthesize_one_rejects_blank_text() {
        let voices = alice_dir();
        let mock = MockBackend::new();

        let mut engine = engine(mock, voices.path());
        let result = engine.synthesize_one("   ", &alice(), &SynthesisOptions::default());

        assert!(matches!(result.unwrap_err(), TTSError::InvalidArgument(_)));
    }

    #[test]
    fn test_synthesize_one_voice_not_found() {
        let voices = alice_dir();
        let mut mock = ready_backend();
        mock.expect_create_voice_clone_prompt().never();

        let mut engine = engine(mock, voices.path());
        let result = engine.synthesize_one(
            "Hi",
            &VoiceSpec::Named("nonexistent".to_string()),
            &SynthesisOptions::default(),
        );

        match result.unwrap_err() {
            TTSError::VoiceNotFound { name, available } => {
                assert_eq!(name, "nonexistent");
                assert_eq!(available, engine.list_voices().unwrap());
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_synthesize_one_reference_audio_missing() {
        let voices = alice_dir();
        let mock = ready_backend();

        let mut engine = engine(mock, voices.path());
        let result = engine.synthesize_one(
            "Hi",
            &VoiceSpec::Reference(PathBuf::from("/nonexistent/ref.wav")),
            &SynthesisOptions::default(),
        );

        assert!(matches!(
            result.unwrap_err(),
            TTSError::ReferenceAudioNotFound(_)
        ));
    }

    #[test]
    fn test_synthesize_one_no_accelerator_fails_before_prepare() {
        let voices = alice_dir();
        let mut mock = MockBackend::new();
        mock.expect_health().times(1).returning(|| Ok(health(false)));
        mock.expect_load_model().never();
        mock.expect_create_voice_clone_prompt().never();
        mock.expect_generate_voice_clone().never();

        let mut engine = engine(mock, voices.path());
        let result = engine.synthesize_one("Hi", &alice(), &SynthesisOptions::default());

        assert!(matches!(
            result.unwrap_err(),
            TTSError::AcceleratorUnavailable(_)
        ));
    }

    // ===========================================
    // synthesize_many tests
    // ===========================================

    #[test]
    fn test_synthesize_many_skips_blank_in_place() {
        let voices = alice_dir();
        let out_dir = TempDir::new().unwrap();

        let mut mock = backend_with_prompt();
        mock.expect_generate_voice_clone()
            .times(2)
            .returning(|_| Ok(audio()));

        let mut engine = engine(mock, voices.path());
        let options = SynthesisOptions::default().with_output_dir(out_dir.path());
        let report = engine
            .synthesize_many(&["hi", "", "  ", "bye"], &alice(), &options)
            .unwrap();

        let names: Vec<_> = report.output_paths().into_iter().map(file_name).collect();
        assert_eq!(names, vec!["tts_0001.wav", "tts_0004.wav"]);
        assert_eq!(report.total(), 4);
        assert_eq!(report.success_count(), 2);
        assert_eq!(report.skipped_count(), 2);
        assert_eq!(report.failure_count(), 0);
        assert!(out_dir.path().join("tts_0004.wav").exists());
        assert!(!out_dir.path().join("tts_0002.wav").exists());
    }

    #[test]
    fn test_synthesize_many_prepares_prompt_once() {
        let voices = alice_dir();
        let out_dir = TempDir::new().unwrap();
        let texts: Vec<String> = (1..=6).map(|i| format!("Sentence number {i}.")).collect();

        let mut mock = backend_with_prompt();
        mock.expect_generate_voice_clone()
            .withf(|req| req.prompt_id == "p-1" && req.max_new_tokens == 1024)
            .times(6)
            .returning(|_| Ok(audio()));

        let mut engine = engine(mock, voices.path());
        let options = SynthesisOptions::default()
            .with_output_dir(out_dir.path())
            .with_output_prefix("chapter")
            .with_max_new_tokens(1024);
        let report = engine.synthesize_many(&texts, &alice(), &options).unwrap();

        assert_eq!(report.success_count(), 6);
        assert_eq!(file_name(report.output_paths()[5]), "chapter_0006.wav");
    }

    #[test]
    fn test_synthesize_many_item_failure_does_not_abort() {
        let voices = alice_dir();
        let out_dir = TempDir::new().unwrap();

        let mut mock = backend_with_prompt();
        mock.expect_generate_voice_clone()
            .withf(|req| req.text == "bad")
            .times(1)
            .returning(|_| Err(BackendError::RequestFailed("Status: 500".to_string())));
        mock.expect_generate_voice_clone()
            .withf(|req| req.text == "silent")
            .times(1)
            .returning(|_| Ok(GeneratedAudio::default()));
        mock.expect_generate_voice_clone()
            .withf(|req| req.text != "bad" && req.text != "silent")
            .times(2)
            .returning(|_| Ok(audio()));

        let mut engine = engine(mock, voices.path());
        let options = SynthesisOptions::default().with_output_dir(out_dir.path());
        let report = engine
            .synthesize_many(&["one", "bad", "silent", "four"], &alice(), &options)
            .unwrap();

        assert_eq!(report.success_count(), 2);
        assert_eq!(report.failure_count(), 2);

        let names: Vec<_> = report.output_paths().into_iter().map(file_name).collect();
        assert_eq!(names, vec!["tts_0001.wav", "tts_0004.wav"]);

        let failures: Vec<_> = report.failures().collect();
        assert_eq!(failures[0].0.index, 2);
        assert!(matches!(
            failures[0].1,
            TTSError::GenerationFailed { index: 2, source } if matches!(**source, TTSError::BackendError(_))
        ));
        assert!(matches!(
            failures[1].1,
            TTSError::GenerationFailed { index: 3, source } if matches!(**source, TTSError::EmptyGeneration)
        ));
    }

    #[test]
    fn test_synthesize_many_empty_list() {
        let voices = alice_dir();
        let mock = MockBackend::new();

        let mut engine = engine(mock, voices.path());
        let texts: [&str; 0] = [];
        let result = engine.synthesize_many(&texts, &alice(), &SynthesisOptions::default());

        assert!(matches!(result.unwrap_err(), TTSError::InvalidArgument(_)));
    }

    #[test]
    fn test_synthesize_many_creates_nested_output_dir() {
        let voices = alice_dir();
        let out_root = TempDir::new().unwrap();
        let nested = out_root.path().join("a").join("b");

        let mut mock = backend_with_prompt();
        mock.expect_generate_voice_clone()
            .times(1)
            .returning(|_| Ok(audio()));

        let mut engine = engine(mock, voices.path());
        let options = SynthesisOptions::default().with_output_dir(&nested);
        let report = engine.synthesize_many(&["hi"], &alice(), &options).unwrap();

        assert_eq!(report.output_dir, nested);
        assert!(nested.join("tts_0001.wav").exists());
    }

    #[test]
    fn test_synthesize_many_temp_output_dir() {
        let voices = alice_dir();

        let mut mock = backend_with_prompt();
        mock.expect_generate_voice_clone()
            .times(1)
            .returning(|_| Ok(audio()));

        let mut engine = engine(mock, voices.path());
        let report = engine
            .synthesize_many(&["hi"], &alice(), &SynthesisOptions::default())
            .unwrap();

        let dir_name = file_name(&report.output_dir).to_string();
        assert!(dir_name.starts_with("qwen3_tts_batch_"));
        assert!(report.output_dir.join("tts_0001.wav").exists());
        std::fs::remove_dir_all(&report.output_dir).unwrap();
    }

    #[test]
    fn test_synthesize_many_bad_output_dir_fails_before_model() {
        let voices = alice_dir();
        let out = TempDir::new().unwrap();
        let blocker = out.path().join("not_a_dir");
        std::fs::write(&blocker, b"plain file").unwrap();

        let mut mock = MockBackend::new();
        mock.expect_health().never();
        mock.expect_load_model().never();
        mock.expect_create_voice_clone_prompt().never();
        mock.expect_generate_voice_clone().never();

        let mut engine = engine(mock, voices.path());
        let options = SynthesisOptions::default().with_output_dir(blocker.join("sub"));
        let result = engine.synthesize_many(&["hi", "bye"], &alice(), &options);

        assert!(matches!(result.unwrap_err(), TTSError::Io(_)));
        assert!(!engine.session().is_ready());
    }

    // ===========================================
    // synthesize_from_source_file tests
    // ===========================================

    #[test]
    fn test_source_file_not_found() {
        let voices = alice_dir();
        let mock = MockBackend::new();

        let mut engine = engine(mock, voices.path());
        let result = engine.synthesize_from_source_file(
            Path::new("/nonexistent/lines.txt"),
            &alice(),
            &SynthesisOptions::default(),
        );

        assert!(matches!(
            result.unwrap_err(),
            TTSError::SourceFileNotFound(_)
        ));
    }

    #[test]
    fn test_source_file_all_blank_fails_before_model() {
        let voices = alice_dir();
        let work = TempDir::new().unwrap();
        let source = work.path().join("blank.txt");
        std::fs::write(&source, "\n   \n\t\n").unwrap();

        let mock = MockBackend::new();
        let mut engine = engine(mock, voices.path());
        let result =
            engine.synthesize_from_source_file(&source, &alice(), &SynthesisOptions::default());

        assert!(matches!(result.unwrap_err(), TTSError::EmptySourceFile(_)));
        assert!(!engine.session().is_ready());
    }

    #[test]
    fn test_source_file_defaults_dir_and_prefix() {
        let voices = alice_dir();
        let work = TempDir::new().unwrap();
        let source = work.path().join("chapter1.txt");
        std::fs::write(&source, "第一句话\n\n  第二句话  \n\n第三句话\n").unwrap();

        let mut mock = backend_with_prompt();
        mock.expect_generate_voice_clone()
            .withf(|req| req.text == "第二句话")
            .times(1)
            .returning(|_| Ok(audio()));
        mock.expect_generate_voice_clone()
            .withf(|req| req.text != "第二句话")
            .times(2)
            .returning(|_| Ok(audio()));

        let mut engine = engine(mock, voices.path());
        let report = engine
            .synthesize_from_source_file(&source, &alice(), &SynthesisOptions::default())
            .unwrap();

        assert_eq!(report.output_dir, work.path());
        assert_eq!(report.total(), 3);
        let names: Vec<_> = report.output_paths().into_iter().map(file_name).collect();
        assert_eq!(
            names,
            vec!["chapter1_0001.wav", "chapter1_0002.wav", "chapter1_0003.wav"]
        );
    }

    #[test]
    fn test_source_file_respects_overrides() {
        let voices = alice_dir();
        let work = TempDir::new().unwrap();
        let out_dir = TempDir::new().unwrap();
        let source = work.path().join("lines.txt");
        std::fs::write(&source, "one\ntwo\n").unwrap();

        let mut mock = backend_with_prompt();
        mock.expect_generate_voice_clone()
            .times(2)
            .returning(|_| Ok(audio()));

        let mut engine = engine(mock, voices.path());
        let options = SynthesisOptions::default()
            .with_output_dir(out_dir.path())
            .with_output_prefix("tts");
        let report = engine
            .synthesize_from_source_file(&source, &alice(), &options)
            .unwrap();

        assert_eq!(report.output_dir, out_dir.path());
        assert!(out_dir.path().join("tts_0002.wav").exists());
        assert!(!work.path().join("lines_0001.wav").exists());
    }
}
