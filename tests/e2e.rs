//! End-to-end tests for md2pdf.
//!
//! Most tests drive the real pipeline against a scripted [`CommandRunner`]
//! that imitates pandoc, LuaLaTeX and Chromium: it writes the files the real
//! tools would write and, for the LaTeX route, reports a
//! `Missing character` warning for every non-ASCII symbol the on-disk
//! fallback table does not route. This exercises the repair loop, the table
//! editor and the artifact handling without any tool installed.
//!
//! The live tests at the bottom need pandoc, LuaLaTeX and Chromium and are
//! gated behind the `E2E_ENABLED` environment variable.
//!
//! Run with:
//!   cargo test --test e2e -- --nocapture

use md2pdf::{
    convert, convert_sync, Capture, CodePoint, CommandOutput, CommandRunner, CommandSpec,
    ConversionConfig, ConversionProgressCallback, FallbackTable, Md2PdfError, MissingGlyphSet,
    PatchOutcome, PipelineVariant, Stage,
};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitStatus;
use std::sync::{Arc, Mutex};

// ── Test helpers ─────────────────────────────────────────────────────────────

const TABLE: &str = "-- fallback routing\n\
function is_emoji(code)\n\
\treturn (code >= 0x1F600 and code <= 0x1F64F)\n\
\t\tor (code == 0x2764)\n\
end\n\
\n\
function Str(el)\n\
\treturn el\n\
end\n";

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

/// Behaviour knobs for [`FakeTools`].
#[derive(Default)]
struct Script {
    /// Report missing glyphs even when the table routes them.
    always_missing: bool,
    /// Exit code for the first typeset.
    first_exit: i32,
    /// Skip writing the output PDF.
    no_output: bool,
    /// Browsers that are "not installed".
    missing_browsers: Vec<String>,
}

struct FakeTools {
    script: Script,
    calls: Mutex<Vec<(CommandSpec, Capture)>>,
}

impl FakeTools {
    fn new(script: Script) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<(CommandSpec, Capture)> {
        self.calls.lock().unwrap().clone()
    }

    fn typeset(&self, cmd: &CommandSpec, attempt: usize) -> CommandOutput {
        let input = PathBuf::from(&cmd.args[0]);
        let table = cmd.value_of("--lua-filter").map(PathBuf::from).unwrap();
        let markdown = fs::read_to_string(&input).unwrap();
        let routed = fs::read_to_string(&table)
            .ok()
            .and_then(|t| FallbackTable::parse(&t).ok());

        let mut stderr = String::from("[INFO] Running lualatex\n");
        for c in markdown.chars().filter(|c| (*c as u32) >= 0x2000) {
            let code = CodePoint::from(c);
            let covered = routed.as_ref().is_some_and(|t| t.covers(code));
            if self.script.always_missing || !covered {
                stderr.push_str(&format!(
                    "[WARNING] Missing character: There is no {c} (U+{code}) in font [lmroman10-regular]:+tlig;!\n"
                ));
            }
        }

        let code = if attempt == 1 { self.script.first_exit } else { 0 };
        if code == 0 && !self.script.no_output {
            write_output(cmd.value_after("-o").unwrap());
        }
        CommandOutput {
            status: exit_status(code),
            stderr,
        }
    }
}

fn write_output(path: impl AsRef<std::ffi::OsStr>) {
    fs::write(Path::new(path.as_ref()), b"%PDF-1.7\n% fake\n").unwrap();
}

impl CommandRunner for FakeTools {
    fn run(&self, cmd: &CommandSpec, capture: Capture) -> Result<CommandOutput, Md2PdfError> {
        if self.script.missing_browsers.contains(&cmd.program) {
            return Err(Md2PdfError::ToolNotFound {
                program: cmd.program.clone(),
                hint: String::new(),
            });
        }

        self.calls.lock().unwrap().push((cmd.clone(), capture));
        let attempt = self
            .calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(c, _)| c.value_of("--lua-filter").is_some())
            .count();

        let mut out = if cmd.value_of("--lua-filter").is_some() {
            self.typeset(cmd, attempt)
        } else if cmd.args.iter().any(|a| a == "--mathjax") {
            let body = format!("<p>{}</p>", fs::read_to_string(&cmd.args[0]).unwrap());
            fs::write(cmd.value_after("-o").unwrap(), body).unwrap();
            CommandOutput {
                status: exit_status(0),
                stderr: String::new(),
            }
        } else {
            if !self.script.no_output {
                write_output(cmd.value_of("--print-to-pdf").unwrap());
            }
            CommandOutput {
                status: exit_status(0),
                stderr: String::new(),
            }
        };

        if capture == Capture::Inherit {
            out.stderr.clear();
        }
        Ok(out)
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    input: PathBuf,
    table: PathBuf,
}

fn fixture(markdown: &str, table: &str) -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("launch.md");
    let table_path = dir.path().join("emoji.lua");
    fs::write(&input, markdown).unwrap();
    fs::write(&table_path, table).unwrap();
    Fixture {
        dir,
        input,
        table: table_path,
    }
}

fn latex_config(fx: &Fixture, tools: &Arc<FakeTools>) -> ConversionConfig {
    ConversionConfig::builder()
        .variant(PipelineVariant::Latex)
        .output_dir(fx.dir.path())
        .fallback_table(&fx.table)
        .runner(tools.clone() as Arc<dyn CommandRunner>)
        .build()
        .unwrap()
}

// ── LaTeX route: repair loop ─────────────────────────────────────────────────

#[test]
fn missing_glyph_is_patched_and_rendered_again() {
    let fx = fixture("# Launch day 🚀\n\nWe ship today.\n", TABLE);
    let tools = FakeTools::new(Script::default());

    let output = convert_sync(&fx.input, &latex_config(&fx, &tools)).unwrap();

    let calls = tools.calls();
    assert_eq!(calls.len(), 2, "expected exactly two typesets");
    assert_eq!(calls[0].1, Capture::Stderr);
    assert_eq!(calls[1].1, Capture::Inherit);
    assert_eq!(calls[0].0, calls[1].0, "retry must run the identical command");

    let table = fs::read_to_string(&fx.table).unwrap();
    assert!(table.contains("\t\tor (code == 0x2764)\n\t\tor (code == 0x1F680)\nend\n"));
    assert_eq!(table.replacen("\n\t\tor (code == 0x1F680)", "", 1), TABLE);

    assert_eq!(output.output_path, fx.dir.path().join("launch_latex.pdf"));
    assert!(fs::metadata(&output.output_path).unwrap().len() > 0);
    assert_eq!(output.stats.render_attempts, 2);
    assert_eq!(output.stats.missing_glyphs, vec![CodePoint(0x1F680)]);
    assert_eq!(output.stats.patched, vec![CodePoint(0x1F680)]);
    assert!(!output.stats.patch_failed);
}

#[test]
fn clean_document_renders_once_without_patching() {
    let fx = fixture("# Plain\n\nNothing exotic here. 😀 is routed.\n", TABLE);
    let tools = FakeTools::new(Script::default());

    let output = convert_sync(&fx.input, &latex_config(&fx, &tools)).unwrap();

    assert_eq!(tools.calls().len(), 1);
    assert_eq!(output.stats.render_attempts, 1);
    assert!(output.stats.missing_glyphs.is_empty());
    assert_eq!(fs::read_to_string(&fx.table).unwrap(), TABLE);
}

#[test]
fn at_most_one_patch_and_one_retry() {
    let fx = fixture("✅ 🚀 🛸 🧪 ⌛ ⭐\n", TABLE);
    let tools = FakeTools::new(Script {
        always_missing: true,
        ..Default::default()
    });

    let output = convert_sync(&fx.input, &latex_config(&fx, &tools)).unwrap();

    assert_eq!(tools.calls().len(), 2);
    assert_eq!(output.stats.render_attempts, 2);

    let table = fs::read_to_string(&fx.table).unwrap();
    for code in ["2705", "1F680", "1F6F8", "1F9EA", "231B", "2B50"] {
        assert_eq!(
            table.matches(&format!("0x{code})")).count(),
            1,
            "0x{code} should be inserted exactly once"
        );
    }
}

#[test]
fn knowledge_accumulates_across_runs() {
    let fx = fixture("Rocket: 🚀\n", TABLE);

    let first = FakeTools::new(Script::default());
    convert_sync(&fx.input, &latex_config(&fx, &first)).unwrap();
    assert_eq!(first.calls().len(), 2);
    let patched = fs::read_to_string(&fx.table).unwrap();

    let second = FakeTools::new(Script::default());
    let output = convert_sync(&fx.input, &latex_config(&fx, &second)).unwrap();
    assert_eq!(second.calls().len(), 1);
    assert_eq!(output.stats.render_attempts, 1);
    assert_eq!(fs::read_to_string(&fx.table).unwrap(), patched);
}

#[test]
fn already_routed_glyphs_are_not_duplicated() {
    let fx = fixture("Heart ❤\n", TABLE);
    let tools = FakeTools::new(Script {
        always_missing: true,
        ..Default::default()
    });

    let output = convert_sync(&fx.input, &latex_config(&fx, &tools)).unwrap();

    assert_eq!(output.stats.render_attempts, 2);
    assert!(output.stats.patched.is_empty());
    assert_eq!(output.stats.already_present, vec![CodePoint(0x2764)]);
    assert_eq!(fs::read_to_string(&fx.table).unwrap(), TABLE);
}

#[test]
fn unrecognised_table_soft_fails_and_still_retries() {
    let broken = "function is_emoji(code)\n\treturn (code == 0x2764)\n";
    let fx = fixture("🚀\n", broken);
    let tools = FakeTools::new(Script::default());

    let output = convert_sync(&fx.input, &latex_config(&fx, &tools)).unwrap();

    assert_eq!(tools.calls().len(), 2);
    assert!(output.stats.patch_failed);
    assert_eq!(fs::read_to_string(&fx.table).unwrap(), broken);
}

#[test]
fn strict_patch_turns_table_failure_fatal() {
    let broken = "-- no predicate function here\n";
    let fx = fixture("🚀\n", broken);
    let tools = FakeTools::new(Script::default());
    let config = ConversionConfig::builder()
        .output_dir(fx.dir.path())
        .fallback_table(&fx.table)
        .strict_patch(true)
        .runner(tools.clone() as Arc<dyn CommandRunner>)
        .build()
        .unwrap();

    let err = convert_sync(&fx.input, &config).unwrap_err();

    assert!(
        matches!(err, Md2PdfError::FallbackTable { .. }),
        "got: {err:?}"
    );
    assert_eq!(tools.calls().len(), 1);
    assert_eq!(fs::read_to_string(&fx.table).unwrap(), broken);
}

#[test]
fn failing_first_typeset_is_fatal() {
    let fx = fixture("🚀\n", TABLE);
    let tools = FakeTools::new(Script {
        first_exit: 43,
        ..Default::default()
    });

    let err = convert_sync(&fx.input, &latex_config(&fx, &tools)).unwrap_err();

    match err {
        Md2PdfError::ToolFailed { command, status } => {
            assert!(command.starts_with("pandoc "));
            assert_eq!(status.code(), Some(43));
        }
        other => panic!("expected ToolFailed, got {other:?}"),
    }
    assert_eq!(tools.calls().len(), 1);
    assert_eq!(fs::read_to_string(&fx.table).unwrap(), TABLE);
}

#[test]
fn missing_output_is_reported() {
    let fx = fixture("plain\n", TABLE);
    let tools = FakeTools::new(Script {
        no_output: true,
        ..Default::default()
    });

    let err = convert_sync(&fx.input, &latex_config(&fx, &tools)).unwrap_err();
    assert!(matches!(err, Md2PdfError::OutputMissing { .. }), "got: {err:?}");
}

#[test]
fn default_table_is_installed_when_absent() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("doc.md");
    fs::write(&input, "🚀\n").unwrap();
    let table = dir.path().join("filters").join("emoji.lua");
    let tools = FakeTools::new(Script::default());
    let config = ConversionConfig::builder()
        .output_dir(dir.path())
        .fallback_table(&table)
        .runner(tools.clone() as Arc<dyn CommandRunner>)
        .build()
        .unwrap();

    let output = convert_sync(&input, &config).unwrap();

    let content = fs::read_to_string(&table).unwrap();
    assert!(content.starts_with(&md2pdf::fallback::DEFAULT_TABLE[..40]));
    assert!(content.contains("or (code == 0x1F680)"));
    assert_eq!(output.stats.patched, vec![CodePoint(0x1F680)]);
}

#[test]
fn intermediates_are_cleaned_up_by_default() {
    let fx = fixture("🚀\n", TABLE);
    let tools = FakeTools::new(Script::default());

    let output = convert_sync(&fx.input, &latex_config(&fx, &tools)).unwrap();

    assert!(output.intermediates_dir.is_none());
    assert!(!fx.dir.path().join("pandoc_log.txt").exists());
    assert!(!fx.dir.path().join("emoji_header.tex").exists());

    let header = tools.calls()[0].0.value_after("-H").cloned().unwrap();
    assert!(!Path::new(&header).exists(), "temp header should be gone");
}

#[test]
fn kept_intermediates_include_log_and_header() {
    let fx = fixture("🚀\n", TABLE);
    let tools = FakeTools::new(Script::default());
    let config = ConversionConfig::builder()
        .output_dir(fx.dir.path())
        .fallback_table(&fx.table)
        .keep_intermediates(true)
        .runner(tools.clone() as Arc<dyn CommandRunner>)
        .build()
        .unwrap();

    convert_sync(&fx.input, &config).unwrap();

    let log = fs::read_to_string(fx.dir.path().join("pandoc_log.txt")).unwrap();
    assert!(log.contains("Missing character"));
    assert_eq!(md2pdf::inspect_log(fx.dir.path().join("pandoc_log.txt")).unwrap().len(), 1);

    let header = fs::read_to_string(fx.dir.path().join("emoji_header.tex")).unwrap();
    assert!(header.contains(r"\newfontfamily\emoji{Noto Color Emoji}"));
}

#[test]
fn kept_intermediates_follow_explicit_output() {
    let fx = fixture("🚀\n", TABLE);
    let tools = FakeTools::new(Script::default());
    let build = fx.dir.path().join("build");
    let config = ConversionConfig::builder()
        .output(build.join("rocket.pdf"))
        .fallback_table(&fx.table)
        .keep_intermediates(true)
        .runner(tools.clone() as Arc<dyn CommandRunner>)
        .build()
        .unwrap();

    let output = convert_sync(&fx.input, &config).unwrap();

    assert_eq!(output.output_path, build.join("rocket.pdf"));
    assert_eq!(output.intermediates_dir, Some(build.clone()));
    assert!(build.join("pandoc_log.txt").exists());
    assert!(build.join("emoji_header.tex").exists());
    assert!(!fx.dir.path().join("pandoc_log.txt").exists());
}

#[derive(Default)]
struct Events(Mutex<Vec<String>>);

impl ConversionProgressCallback for Events {
    fn on_stage_start(&self, stage: Stage) {
        self.0.lock().unwrap().push(format!("start {stage}"));
    }
    fn on_missing_glyphs(&self, missing: &MissingGlyphSet) {
        self.0.lock().unwrap().push(format!("missing {missing}"));
    }
    fn on_table_patched(&self, outcome: &PatchOutcome) {
        self.0.lock().unwrap().push(format!("patched {}", outcome.added.len()));
    }
}

#[test]
fn progress_events_follow_the_state_machine() {
    let fx = fixture("🚀\n", TABLE);
    let tools = FakeTools::new(Script::default());
    let events = Arc::new(Events::default());
    let config = ConversionConfig::builder()
        .output_dir(fx.dir.path())
        .fallback_table(&fx.table)
        .runner(tools.clone() as Arc<dyn CommandRunner>)
        .progress_callback(events.clone())
        .build()
        .unwrap();

    convert_sync(&fx.input, &config).unwrap();

    assert_eq!(
        *events.0.lock().unwrap(),
        vec![
            "start typeset (attempt 1)",
            "start scan diagnostics",
            "missing U+1F680",
            "start patch fallback table",
            "patched 1",
            "start typeset (attempt 2)",
        ]
    );
}

// ── HTML route ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn html_route_themes_and_rasterises() {
    let fx = fixture("# Title 🚀\n", TABLE);
    let tools = FakeTools::new(Script::default());
    let config = ConversionConfig::builder()
        .variant(PipelineVariant::Html)
        .output_dir(fx.dir.path())
        .keep_intermediates(true)
        .runner(tools.clone() as Arc<dyn CommandRunner>)
        .build()
        .unwrap();

    let output = convert(&fx.input, &config).await.unwrap();

    let calls = tools.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].0.program, "pandoc");
    assert_eq!(calls[1].0.program, "chromium");
    assert!(calls.iter().all(|(_, c)| *c == Capture::Inherit));

    let full = fs::read_to_string(fx.dir.path().join("launch_full.html")).unwrap();
    assert!(full.starts_with("<!DOCTYPE html>"));
    assert!(full.contains("--bg0: #282c34;"));
    assert!(full.contains("<p># Title 🚀\n</p>"));

    assert_eq!(output.output_path, fx.dir.path().join("launch_html.pdf"));
    assert_eq!(output.stats.render_attempts, 1);
    assert_eq!(fs::read_to_string(&fx.table).unwrap(), TABLE, "html route never patches");
}

#[test]
fn html_route_falls_back_to_next_browser() {
    let fx = fixture("hello\n", TABLE);
    let tools = FakeTools::new(Script {
        missing_browsers: vec!["chromium".into()],
        ..Default::default()
    });
    let config = ConversionConfig::builder()
        .variant(PipelineVariant::Html)
        .output_dir(fx.dir.path())
        .runner(tools.clone() as Arc<dyn CommandRunner>)
        .build()
        .unwrap();

    convert_sync(&fx.input, &config).unwrap();

    let programs: Vec<String> = tools.calls().into_iter().map(|(c, _)| c.program).collect();
    assert_eq!(programs, vec!["pandoc", "chromium-browser"]);
}

#[test]
fn html_route_reports_when_no_browser_exists() {
    let fx = fixture("hello\n", TABLE);
    let tools = FakeTools::new(Script {
        missing_browsers: vec!["chromium".into(), "chrome".into()],
        ..Default::default()
    });
    let config = ConversionConfig::builder()
        .variant(PipelineVariant::Html)
        .output_dir(fx.dir.path())
        .browser_bins(["chromium", "chrome"])
        .runner(tools.clone() as Arc<dyn CommandRunner>)
        .build()
        .unwrap();

    let err = convert_sync(&fx.input, &config).unwrap_err();
    match err {
        Md2PdfError::ToolNotFound { program, hint } => {
            assert_eq!(program, "chromium");
            assert!(hint.contains("chromium, chrome"), "got: {hint}");
        }
        other => panic!("expected ToolNotFound, got {other:?}"),
    }
}

#[test]
fn custom_stylesheet_replaces_theme() {
    let fx = fixture("hello\n", TABLE);
    let tools = FakeTools::new(Script::default());
    let config = ConversionConfig::builder()
        .variant(PipelineVariant::Html)
        .output_dir(fx.dir.path())
        .keep_intermediates(true)
        .stylesheet("<style>body { color: red; }</style>")
        .runner(tools.clone() as Arc<dyn CommandRunner>)
        .build()
        .unwrap();

    convert_sync(&fx.input, &config).unwrap();

    let full = fs::read_to_string(fx.dir.path().join("launch_full.html")).unwrap();
    assert!(full.contains("body { color: red; }"));
    assert!(!full.contains("--bg0"));
}

// ── Live tools (opt-in) ──────────────────────────────────────────────────────

/// Skip unless E2E_ENABLED is set.
macro_rules! e2e_skip_unless_enabled {
    () => {
        if std::env::var("E2E_ENABLED").is_err() {
            println!("SKIP — set E2E_ENABLED=1 to run live-tool tests");
            return;
        }
    };
}

#[tokio::test]
async fn live_latex_route_repairs_rocket() {
    e2e_skip_unless_enabled!();

    let fx = fixture("# Live test\n\nLift-off 🚀\n", TABLE);
    let config = ConversionConfig::builder()
        .output_dir(fx.dir.path())
        .fallback_table(&fx.table)
        .build()
        .unwrap();

    let output = convert(&fx.input, &config).await.expect("conversion should succeed");

    assert!(output.stats.output_bytes > 0);
    println!("stats: {:?}", output.stats);
}

#[tokio::test]
async fn live_html_route() {
    e2e_skip_unless_enabled!();

    let fx = fixture("# Live test\n\n**bold** and `code`\n", TABLE);
    let config = ConversionConfig::builder()
        .variant(PipelineVariant::Html)
        .output_dir(fx.dir.path())
        .build()
        .unwrap();

    let output = convert(&fx.input, &config).await.expect("conversion should succeed");
    assert!(output.stats.output_bytes > 0);
}
