use std::io::Write as _;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use smaran::credentials::{CredentialSource, ProcessEnv, SqliteCredentialStore};
use smaran::db::{self, ChatType, HistoryRepo, NewHistoryRecord};
use smaran::openai::{
    ApiClient, Completion, CompletionClient, CompletionOptions, ImageClient, ImageGenerator,
    ImageQuality, ImageSize, SpeechClient, SpeechSynthesizer, StoryIllustrator,
    TranscriptionClient,
};
use smaran::voice::{
    AudioHandle, AudioSink, CaptureEvent, ChatMessage, MicrophoneEngine, NoticeLevel,
    PlaybackController, Recorder, Role, SpeakerSink, SpeechCapture, TurnCommand, TurnEvent,
    VOICE_SYSTEM_PROMPT, rms,
};
use smaran::tutor::{
    Difficulty, GrammarLevel, GrammarTutor, LessonOrigin, LessonRequest, PracticeChat,
    PracticeMode, StudyPlanRequest, StudyPlanner,
};
use smaran::{ChapterQuestion, ChapterTutor, Config, DbPool, KeyFormat, KeyStore};

/// Smaran - voice study assistant for children
#[derive(Parser)]
#[command(name = "smaran", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Talk with the assistant (default)
    Voice,
    /// Ask a single question and stream the answer
    Ask {
        /// Question text
        question: String,
        /// Wait for the full answer instead of streaming
        #[arg(long)]
        no_stream: bool,
    },
    /// Ask a question about a chapter
    Tutor {
        /// Plain-text file with the chapter content
        #[arg(short, long)]
        file: PathBuf,
        /// Chapter name
        #[arg(short, long, default_value = "Chapter")]
        chapter: String,
        /// Student's class
        #[arg(long, env = "SMARAN_CLASS", default_value = "6")]
        class: String,
        /// Question text
        question: String,
    },
    /// Chat with a tutor that answers with guiding questions
    Socratic,
    /// Practice conversational English
    Practice,
    /// Take a generated grammar lesson and quiz
    Grammar {
        /// Lesson topic (pick from the level's list when omitted)
        topic: Option<String>,
        /// beginner, intermediate or advanced
        #[arg(short, long, default_value = "beginner")]
        level: String,
        /// easy, medium or hard
        #[arg(short, long, default_value = "easy")]
        difficulty: String,
        /// Number of quiz questions
        #[arg(short = 'n', long, default_value = "5")]
        questions: usize,
    },
    /// Generate a three-day study plan for a chapter
    Plan {
        /// Plain-text file with the chapter content
        #[arg(short, long)]
        file: PathBuf,
        /// Book or subject name
        #[arg(short, long)]
        subject: String,
        /// Chapter name
        #[arg(short, long)]
        chapter: String,
        /// Student's grade
        #[arg(short, long)]
        grade: Option<String>,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Speak text aloud
    Speak {
        /// Text to speak
        text: String,
        /// Voice override
        #[arg(long)]
        voice: Option<String>,
        /// Write MP3 to this file instead of playing it
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Generate an image from a prompt
    Image {
        /// Image prompt
        prompt: String,
        /// 1024x1024, 1024x1792 or 1792x1024
        #[arg(long)]
        size: Option<String>,
        /// standard or hd
        #[arg(long)]
        quality: Option<String>,
    },
    /// Illustrate a story with four consistent images
    Story {
        /// Story text (reads --file when omitted)
        text: Option<String>,
        /// Plain-text file with the story
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Manage the OpenAI API key
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
    /// Show or clear saved conversations
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,
    },
    /// Test speaker output
    TestSpeaker,
}

#[derive(Subcommand)]
enum KeyAction {
    /// Save a key for future sessions (prompts when omitted)
    Set { value: Option<String> },
    /// Show the active key, masked
    Show,
    /// Forget the saved key
    Clear,
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List saved records, newest first
    List {
        /// Only this chat type (e.g. voice-bot, teacher)
        #[arg(short = 't', long = "type")]
        chat_type: Option<String>,
        /// Maximum records
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Delete saved records
    Clear {
        /// Only this chat type
        #[arg(short = 't', long = "type")]
        chat_type: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info,smaran=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Loaded configuration, storage and API access shared by commands
struct App {
    config: Config,
    db: DbPool,
    keys: KeyStore,
    api: ApiClient,
}

impl App {
    fn open() -> anyhow::Result<Self> {
        let config = Config::load()?;
        tracing::debug!(?config, "loaded configuration");

        let db = db::init(config.db_path())?;
        let keys = KeyStore::new(ProcessEnv, SqliteCredentialStore::new(db.clone()));
        let api = ApiClient::from_config(&config, keys.clone());

        Ok(Self {
            config,
            db,
            keys,
            api,
        })
    }

    fn history(&self) -> HistoryRepo {
        HistoryRepo::new(self.db.clone())
    }

    fn completion(&self) -> Arc<dyn Completion> {
        Arc::new(CompletionClient::from_config(self.api.clone(), &self.config))
    }

    fn require_key(&self) -> anyhow::Result<()> {
        if self.keys.get().is_none() {
            anyhow::bail!("no API key set; run `smaran key set` or export OPENAI_API_KEY");
        }
        Ok(())
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Command::Voice) {
        Command::TestMic { duration } => test_mic(duration).await,
        Command::TestSpeaker => test_speaker(),
        Command::Key { action } => cmd_key(&App::open()?, action),
        Command::History { action } => cmd_history(&App::open()?, action),
        Command::Voice => cmd_voice(App::open()?).await,
        Command::Ask {
            question,
            no_stream,
        } => cmd_ask(&App::open()?, &question, no_stream).await,
        Command::Tutor {
            file,
            chapter,
            class,
            question,
        } => {
            let content = std::fs::read_to_string(&file)?;
            let request = ChapterQuestion {
                class,
                chapter,
                content,
                question,
            };
            cmd_tutor(&App::open()?, &request).await
        }
        Command::Socratic => cmd_practice(&App::open()?, PracticeMode::Socratic).await,
        Command::Practice => cmd_practice(&App::open()?, PracticeMode::SpokenEnglish).await,
        Command::Grammar {
            topic,
            level,
            difficulty,
            questions,
        } => {
            let level = GrammarLevel::parse(&level)
                .ok_or_else(|| anyhow::anyhow!("unknown level: {level}"))?;
            let difficulty = Difficulty::parse(&difficulty)
                .ok_or_else(|| anyhow::anyhow!("unknown difficulty: {difficulty}"))?;
            let topic = match topic {
                Some(topic) => topic,
                None => {
                    let topics = level.topics();
                    let picked = dialoguer::Select::new()
                        .with_prompt("Topic")
                        .items(topics)
                        .default(0)
                        .interact()?;
                    topics[picked].to_string()
                }
            };
            let request = LessonRequest {
                topic,
                level,
                difficulty,
                question_count: questions,
            };
            cmd_grammar(&App::open()?, &request).await
        }
        Command::Plan {
            file,
            subject,
            chapter,
            grade,
            json,
        } => {
            let content = std::fs::read_to_string(&file)?;
            let request = StudyPlanRequest {
                subject,
                chapter,
                grade,
                content,
            };
            cmd_plan(&App::open()?, &request, json).await
        }
        Command::Speak { text, voice, out } => {
            cmd_speak(&App::open()?, &text, voice, out.as_deref()).await
        }
        Command::Image {
            prompt,
            size,
            quality,
        } => cmd_image(&App::open()?, &prompt, size.as_deref(), quality.as_deref()).await,
        Command::Story { text, file } => {
            let story = match (text, file) {
                (Some(text), _) => text,
                (None, Some(path)) => std::fs::read_to_string(path)?,
                (None, None) => anyhow::bail!("provide the story text or --file"),
            };
            cmd_story(&App::open()?, &story).await
        }
    }
}

/// Interactive voice session
#[allow(clippy::future_not_send, clippy::too_many_lines)]
async fn cmd_voice(app: App) -> anyhow::Result<()> {
    app.require_key()?;

    let engine = MicrophoneEngine::new(TranscriptionClient::from_config(
        app.api.clone(),
        &app.config,
    ));
    let (capture_tx, mut capture_rx) = mpsc::unbounded_channel();
    let (mut capture, mut engine_rx) = SpeechCapture::new(engine, capture_tx);

    let (playback_tx, mut playback_rx) = mpsc::unbounded_channel();
    let playback = PlaybackController::new(SpeakerSink::new(), playback_tx);

    let speech: Arc<dyn SpeechSynthesizer> = Arc::new(
        SpeechClient::from_config(app.api.clone(), &app.config)
            .with_voice(smaran::voice::REPLY_VOICE),
    );
    let (turn_tx, mut turn_rx) = mpsc::unbounded_channel();
    let coordinator =
        smaran::voice::VoiceTurnCoordinator::new(app.completion(), speech, playback, turn_tx)
            .with_history(app.history());
    let gate = coordinator.gate().clone();

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let worker = tokio::spawn(coordinator.run(command_rx));

    println!("Press Enter to start or stop listening, r to replay, s to stop audio, q to quit.");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match line.trim() {
                    "" => {
                        if capture.is_listening() {
                            capture.stop();
                            println!("Thinking...");
                        } else if gate.is_busy() {
                            println!("Still answering, please wait.");
                        } else if let Err(e) = capture.start() {
                            eprintln!("{}", e.user_message());
                        } else {
                            println!("Listening... press Enter when done.");
                        }
                    }
                    "r" => {
                        let _ = command_tx.send(TurnCommand::Replay);
                    }
                    "s" => {
                        let _ = command_tx.send(TurnCommand::StopAudio);
                    }
                    "q" => break,
                    _ => println!("Enter = talk, r = replay, s = stop audio, q = quit"),
                }
            }
            Some(event) = engine_rx.recv() => capture.handle_engine_event(event),
            Some(event) = capture_rx.recv() => match event {
                CaptureEvent::TranscriptChanged(text) => {
                    if !text.is_empty() {
                        println!("  … {text}");
                    }
                }
                CaptureEvent::FinalTranscript(text) => match gate.try_acquire() {
                    Ok(guard) => {
                        let _ = command_tx.send(TurnCommand::Transcript { text, guard });
                    }
                    Err(e) => tracing::warn!(error = %e, "dropping transcript"),
                },
                CaptureEvent::EndedUnexpectedly => {
                    println!("Listening stopped unexpectedly. Press Enter to restart.");
                }
                CaptureEvent::Error(error) => eprintln!("{}", error.message),
            },
            Some(event) = turn_rx.recv() => print_turn_event(event),
            Some(event) = playback_rx.recv() => tracing::debug!(?event, "playback"),
        }
    }

    if capture.is_listening() {
        capture.stop();
    }
    drop(command_tx);
    worker.await?;
    Ok(())
}

fn print_turn_event(event: TurnEvent) {
    match event {
        TurnEvent::Message(ChatMessage { role, content, .. }) => match role {
            Role::User => println!("you: {content}"),
            Role::Assistant => println!("smaran: {content}"),
        },
        TurnEvent::Notice(notice) => match notice.level {
            NoticeLevel::Error => eprintln!("error: {}", notice.message),
            NoticeLevel::Warning => eprintln!("warning: {}", notice.message),
            NoticeLevel::Info => println!("{}", notice.message),
        },
        TurnEvent::NothingToReplay => println!("Nothing to replay yet."),
        TurnEvent::Idle => println!("Press Enter to talk."),
        TurnEvent::AudioAttached { .. } => {}
    }
}

/// Ask one question, streaming by default
async fn cmd_ask(app: &App, question: &str, no_stream: bool) -> anyhow::Result<()> {
    app.require_key()?;
    let completion = app.completion();

    if no_stream {
        let answer = completion
            .complete(VOICE_SYSTEM_PROMPT, question, CompletionOptions::new())
            .await?;
        println!("{answer}");
        return Ok(());
    }

    let mut print_chunk = |chunk: &str| {
        print!("{chunk}");
        let _ = std::io::stdout().flush();
    };
    completion
        .complete(
            VOICE_SYSTEM_PROMPT,
            question,
            CompletionOptions::new().streaming(&mut print_chunk),
        )
        .await?;
    println!();
    Ok(())
}

/// Stream an answer about a chapter
async fn cmd_tutor(app: &App, request: &ChapterQuestion) -> anyhow::Result<()> {
    let tutor = ChapterTutor::new(app.completion(), app.keys.clone()).with_history(app.history());

    let mut print_chunk = |chunk: &str| {
        print!("{chunk}");
        let _ = std::io::stdout().flush();
    };
    tutor.ask(request, &mut print_chunk).await?;
    println!();
    Ok(())
}

/// Line-by-line practice chat until an empty line or end of input
async fn cmd_practice(app: &App, mode: PracticeMode) -> anyhow::Result<()> {
    app.require_key()?;
    let mut chat = PracticeChat::new(mode, app.completion(), app.keys.clone())
        .with_history(app.history());

    match mode {
        PracticeMode::Socratic => println!("Ask a question. An empty line quits."),
        PracticeMode::SpokenEnglish => println!("Say something in English. An empty line quits."),
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            break;
        }
        match chat.reply(&line).await {
            Ok(reply) => println!("smaran: {reply}\n"),
            Err(e) => eprintln!("{}", e.user_message()),
        }
    }
    Ok(())
}

/// Show a grammar lesson, then run its quiz
async fn cmd_grammar(app: &App, request: &LessonRequest) -> anyhow::Result<()> {
    let tutor = GrammarTutor::new(app.completion(), app.keys.clone());
    println!("Preparing a lesson about {}...", request.topic.trim());
    let lesson = tutor.generate(request).await?;

    match lesson.origin {
        LessonOrigin::Fallback => {
            eprintln!("warning: the lesson could not be generated, showing a basic one");
        }
        LessonOrigin::Padded { added } => {
            eprintln!("warning: added {added} practice questions to complete the quiz");
        }
        LessonOrigin::Generated | LessonOrigin::Trimmed { .. } => {}
    }

    println!("\n{} ({})\n\n{}\n", lesson.title, lesson.level, lesson.content);
    for example in &lesson.examples {
        println!("  - {example}");
    }
    println!();

    let mut answers = Vec::with_capacity(lesson.questions.len());
    for (i, question) in lesson.questions.iter().enumerate() {
        let picked = dialoguer::Select::new()
            .with_prompt(format!("{}. {}", i + 1, question.question))
            .items(&question.options)
            .interact()?;
        if let Some(explanation) = question.explanations.get(picked) {
            println!("  {explanation}");
        }
        answers.push(Some(picked));
    }

    let score = lesson.score(&answers)?;
    println!("\n{} ({}/{})", score.feedback(), score.correct, score.total);
    Ok(())
}

/// Generate and print a study plan
async fn cmd_plan(app: &App, request: &StudyPlanRequest, json: bool) -> anyhow::Result<()> {
    let planner = StudyPlanner::new(app.completion(), app.keys.clone());
    let plan = planner.generate(request).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&plan)?);
        return Ok(());
    }

    println!("{} ({})", plan.chapter_title, plan.duration);
    if !plan.prior_knowledge.is_empty() {
        println!("\nBefore you start:");
        for item in &plan.prior_knowledge {
            println!("  - {item}");
        }
    }
    for day in &plan.structure {
        println!("\nDay {}: {}", day.day, day.title);
        for task in &day.tasks {
            println!("  [ ] {} ({})", task.name, task.duration);
            if !task.details.is_empty() {
                println!("      {}", task.details);
            }
        }
    }
    if !plan.tips.is_empty() {
        println!("\nTips:");
        for tip in &plan.tips {
            println!("  - {tip}");
        }
    }
    Ok(())
}

/// Synthesize text and play it or write it to a file
async fn cmd_speak(
    app: &App,
    text: &str,
    voice: Option<String>,
    out: Option<&std::path::Path>,
) -> anyhow::Result<()> {
    app.require_key()?;
    let mut client = SpeechClient::from_config(app.api.clone(), &app.config);
    if let Some(voice) = voice {
        client = client.with_voice(voice);
    }

    let mp3 = client.synthesize(text).await?;
    tracing::debug!(bytes = mp3.len(), "speech received");

    if let Some(path) = out {
        std::fs::write(path, &mp3)?;
        println!("Wrote {} bytes to {}", mp3.len(), path.display());
        return Ok(());
    }

    let mut sink = SpeakerSink::new();
    sink.load_and_play(&AudioHandle::new(mp3))?;
    tokio::task::block_in_place(|| sink.wait());
    Ok(())
}

/// Generate one image
async fn cmd_image(
    app: &App,
    prompt: &str,
    size: Option<&str>,
    quality: Option<&str>,
) -> anyhow::Result<()> {
    app.require_key()?;
    let mut client = ImageClient::from_config(app.api.clone(), &app.config);
    if let Some(size) = size {
        let size = ImageSize::parse(size).ok_or_else(|| anyhow::anyhow!("unknown size: {size}"))?;
        client = client.with_size(size);
    }
    if let Some(quality) = quality {
        let quality = ImageQuality::parse(quality)
            .ok_or_else(|| anyhow::anyhow!("unknown quality: {quality}"))?;
        client = client.with_quality(quality);
    }

    let url = client.generate(prompt).await?;
    println!("{url}");

    let record = NewHistoryRecord::new(ChatType::StoryImages, prompt).with_image_url(url);
    if let Err(e) = app.history().save(&record) {
        tracing::warn!(error = %e, "failed to save image to history");
    }
    Ok(())
}

/// Illustrate a story
async fn cmd_story(app: &App, story: &str) -> anyhow::Result<()> {
    app.require_key()?;
    let images: Arc<dyn ImageGenerator> =
        Arc::new(ImageClient::from_config(app.api.clone(), &app.config));
    let illustrator = StoryIllustrator::new(app.completion(), images);

    println!("Illustrating story, this can take a minute...");
    let result = illustrator.illustrate(story).await?;

    for (i, ((segment, prompt), url)) in result
        .segments
        .iter()
        .zip(&result.prompts)
        .zip(&result.image_urls)
        .enumerate()
    {
        println!("\nScene {}: {segment}\n  prompt: {prompt}\n  image:  {url}", i + 1);
    }

    let record = NewHistoryRecord::new(ChatType::StoryImages, story)
        .with_image_url(result.image_urls.first().cloned().unwrap_or_default())
        .with_data(serde_json::json!({
            "segments": result.segments,
            "prompts": result.prompts,
            "image_urls": result.image_urls,
        }));
    if let Err(e) = app.history().save(&record) {
        tracing::warn!(error = %e, "failed to save story to history");
    }
    Ok(())
}

/// Manage the stored key
fn cmd_key(app: &App, action: KeyAction) -> anyhow::Result<()> {
    match action {
        KeyAction::Set { value } => {
            let value = match value {
                Some(value) => value,
                None => dialoguer::Password::new()
                    .with_prompt("OpenAI API key")
                    .interact()?,
            };
            match app.keys.set(&value)? {
                KeyFormat::Project => println!("Project API key saved."),
                KeyFormat::Standard => println!("API key saved."),
                KeyFormat::LikelyInvalid => {
                    println!("Key saved, but it doesn't look like an OpenAI key (expected sk-...).");
                }
            }
            if let Some((_, CredentialSource::Environment)) = app.keys.get_with_source() {
                println!("Note: OPENAI_API_KEY is set and takes precedence.");
            }
        }
        KeyAction::Show => match app.keys.get_with_source() {
            Some((key, source)) => {
                let from = match source {
                    CredentialSource::Environment => "environment",
                    CredentialSource::Persisted => "saved",
                };
                println!("{} ({from})", key.masked());
            }
            None => println!("No API key set."),
        },
        KeyAction::Clear => {
            app.keys.clear()?;
            println!("Saved API key removed.");
        }
    }
    Ok(())
}

/// List or clear history
fn cmd_history(app: &App, action: HistoryAction) -> anyhow::Result<()> {
    let parse_type = |value: Option<String>| -> anyhow::Result<Option<ChatType>> {
        value
            .map(|v| ChatType::parse(&v).ok_or_else(|| anyhow::anyhow!("unknown chat type: {v}")))
            .transpose()
    };
    let repo = app.history();

    match action {
        HistoryAction::List { chat_type, limit } => {
            let records = repo.list(parse_type(chat_type)?, limit)?;
            if records.is_empty() {
                println!("No history yet.");
            }
            for record in records {
                println!(
                    "[{}] {} {}",
                    record.timestamp.format("%Y-%m-%d %H:%M"),
                    record.chat_type,
                    record.text
                );
                if let Some(response) = &record.ai_response {
                    println!("    -> {response}");
                }
                if let Some(url) = &record.image_url {
                    println!("    image: {url}");
                }
            }
        }
        HistoryAction::Clear { chat_type } => {
            let removed = repo.clear(parse_type(chat_type)?)?;
            println!("Removed {removed} records.");
        }
    }
    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let recorder = Recorder::start(|e| eprintln!("capture error: {e}"))?;
    println!("Sample rate: {} Hz", recorder.sample_rate());
    println!("---");

    for i in 0..duration {
        tokio::time::sleep(Duration::from_secs(1)).await;

        let samples = recorder.peek_buffer();
        let energy = rms(&samples);
        let peak = samples.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let meter_len = (energy * 100.0).min(50.0) as usize;
        let meter: String = "#".repeat(meter_len) + &" ".repeat(50 - meter_len);

        println!(
            "[{:2}s] RMS: {:.4} | Peak: {:.4} | [{}]",
            i + 1,
            energy,
            peak,
            meter
        );

        recorder.clear_buffer();
    }

    let _ = recorder.finish();

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Test speaker output with a sine wave
fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let sample_rate = 24000_u32;
    let frequency = 440.0_f32;
    let num_samples = 48_000_usize;

    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..num_samples)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3
        })
        .collect();

    println!("Playing {} samples at {} Hz...", samples.len(), sample_rate);

    let mut sink = SpeakerSink::new();
    sink.play_pcm(samples, sample_rate)?;
    sink.wait();

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");
    println!("If you didn't hear anything, check:");
    println!("  1. Run: pactl info | grep 'Default Sink'");
    println!("  2. Run: pactl list sinks short");

    Ok(())
}
