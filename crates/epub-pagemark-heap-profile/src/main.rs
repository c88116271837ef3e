//! DHAT heap profiler for epub-pagemark.
//!
//! Profiles allocation patterns across the marking pipeline:
//! parse -> flatten -> mark -> serialize.
//!
//! Usage:
//!   cargo run -p epub-pagemark-heap-profile --release -- [OPTIONS] [XHTML_FILES...]
//!
//! Each XHTML file is paired with `<stem>.pages.json` when one sits next to it.
//! Otherwise records are sampled from the document itself (the last words of
//! every fourth paragraph). With no files, a generated chapter is profiled.
//!
//! Outputs dhat-<phase>.json files in the output directory (default: target/memory).
//! Open in https://nnethercote.github.io/dh_view/dh_view.html

#[global_allocator]
static ALLOC: dhat::Alloc = dhat::Alloc;

use std::path::{Path, PathBuf};
use std::process::Command;

use epub_pagemark::{
    mark_document, parse_records_json, ContentTree, MarkOptions, MatchStrategy, SnippetRecord,
    TextModel,
};

const SAMPLE_EVERY: usize = 4;
const SAMPLE_WORDS: usize = 5;
const GENERATED_NAME: &str = "generated";

#[derive(Clone, Copy, PartialEq, Eq)]
enum Phase {
    Parse,
    Flatten,
    Mark,
    Fuzzy,
    Full,
}

impl Phase {
    fn from_str(s: &str) -> Option<Self> {
        match s {
            "parse" => Some(Self::Parse),
            "flatten" => Some(Self::Flatten),
            "mark" => Some(Self::Mark),
            "fuzzy" => Some(Self::Fuzzy),
            "full" => Some(Self::Full),
            _ => None,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::Parse => "parse",
            Self::Flatten => "flatten",
            Self::Mark => "mark",
            Self::Fuzzy => "fuzzy",
            Self::Full => "full",
        }
    }
}

/// Input document plus the records to place in it.
struct Workload {
    xhtml: String,
    records: Vec<SnippetRecord>,
}

fn generated_xhtml() -> String {
    let words = [
        "river", "lantern", "quiet", "harbor", "stone", "letter", "morning", "garden", "window",
        "distant", "silver", "road", "winter", "candle", "shadow", "orchard",
    ];
    let mut out = String::from("<html xmlns=\"http://www.w3.org/1999/xhtml\"><body>\n");
    for p in 0..600 {
        out.push_str("<p>");
        for w in 0..90 {
            if w > 0 {
                out.push(' ');
            }
            let word = words[(p * 31 + w * 7 + w / 5) % words.len()];
            if w % 17 == 3 {
                out.push_str(&format!("<i>{}</i>", word));
            } else {
                out.push_str(word);
            }
        }
        out.push_str(&format!(" mark{} end.</p>\n", p));
    }
    out.push_str("</body></html>\n");
    out
}

fn sample_records(xhtml: &str) -> Vec<SnippetRecord> {
    let tree = ContentTree::parse(xhtml).unwrap_or_else(|e| panic!("parse: {}", e));
    let mut model = TextModel::new(&tree);
    model.ensure_all(&tree);
    (0..model.len())
        .filter(|index| index % SAMPLE_EVERY == SAMPLE_EVERY - 1)
        .filter_map(|index| model.get(index))
        .enumerate()
        .map(|(page, flat)| {
            let words: Vec<&str> = flat.normalized().split(' ').collect();
            let tail = words[words.len().saturating_sub(SAMPLE_WORDS)..].join(" ");
            SnippetRecord::new(page as u64 + 1, tail)
        })
        .collect()
}

fn load(path: Option<&Path>) -> Workload {
    let Some(path) = path else {
        let xhtml = generated_xhtml();
        let records = sample_records(&xhtml);
        return Workload { xhtml, records };
    };
    let xhtml = std::fs::read_to_string(path)
        .unwrap_or_else(|e| panic!("read {}: {}", path.display(), e));
    let pages = path.with_extension("pages.json");
    let records = if pages.exists() {
        let json = std::fs::read_to_string(&pages)
            .unwrap_or_else(|e| panic!("read {}: {}", pages.display(), e));
        parse_records_json(&json).unwrap_or_else(|e| panic!("records {}: {}", pages.display(), e))
    } else {
        sample_records(&xhtml)
    };
    Workload { xhtml, records }
}

fn profile(workload: &Workload, phase: Phase) {
    let parse = || {
        ContentTree::parse(&workload.xhtml).unwrap_or_else(|e| panic!("parse: {}", e))
    };

    match phase {
        Phase::Parse => {
            let _tree = parse();
        }
        Phase::Flatten => {
            let tree = parse();
            let mut model = TextModel::new(&tree);
            model.ensure_all(&tree);
        }
        Phase::Mark | Phase::Fuzzy => {
            let mut tree = parse();
            let options = if matches!(phase, Phase::Fuzzy) {
                MarkOptions::default().with_strategy(MatchStrategy::ExactThenDeferredFuzzy)
            } else {
                MarkOptions::default()
            };
            let report = mark_document(&mut tree, &workload.records, options)
                .unwrap_or_else(|e| panic!("mark: {}", e));
            eprintln!(
                "    placed {}/{} ({} not found)",
                report.stats.placed, report.stats.total, report.stats.not_found
            );
        }
        Phase::Full => {
            let mut tree = parse();
            let _ = mark_document(&mut tree, &workload.records, MarkOptions::default());
            let out = tree.to_xhtml();
            if out.len() < workload.xhtml.len() {
                panic!("serialized output shrank");
            }
        }
    }
}

fn short_name(path: Option<&Path>) -> String {
    path.and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| GENERATED_NAME.to_string())
}

fn usage() {
    eprintln!("Usage: heap-profile [OPTIONS] [XHTML_FILES...]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --phase <parse|flatten|mark|fuzzy|full>  Pipeline phase to profile (default: mark)");
    eprintln!("  --out-dir <DIR>                      Output directory for dhat JSON (default: target/memory)");
    eprintln!("  --aggregate                          Single profile for all files (default: per-file)");
    eprintln!();
    eprintln!("By default, each file gets its own clean DHAT profile (separate process).");
    eprintln!("If no files are given, profiles a generated chapter.");
}

fn main() {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut phase = Phase::Mark;
    let mut out_dir = PathBuf::from("target/memory");
    let mut files: Vec<PathBuf> = Vec::with_capacity(8);
    let mut aggregate = false;
    // Internal flag: set in the child process that profiles one file.
    let mut single_file_mode = false;
    let mut i = 0;

    while i < args.len() {
        match args[i].as_str() {
            "--phase" => {
                i += 1;
                let value = args.get(i).map(String::as_str).unwrap_or("");
                phase = Phase::from_str(value).unwrap_or_else(|| {
                    eprintln!("Unknown phase: {}", value);
                    usage();
                    std::process::exit(1);
                });
            }
            "--out-dir" => {
                i += 1;
                let Some(dir) = args.get(i) else {
                    usage();
                    std::process::exit(1);
                };
                out_dir = PathBuf::from(dir);
            }
            "--aggregate" => aggregate = true,
            "--single-file" => single_file_mode = true,
            "--help" | "-h" => {
                usage();
                std::process::exit(0);
            }
            other => files.push(PathBuf::from(other)),
        }
        i += 1;
    }

    std::fs::create_dir_all(&out_dir).unwrap_or_else(|e| {
        eprintln!("Failed to create output dir {}: {}", out_dir.display(), e);
        std::process::exit(1);
    });

    let phase_name = phase.name();

    // Workloads are loaded before the profiler starts so input I/O stays out of the profile.
    if files.is_empty() || single_file_mode {
        let file = files.first().map(PathBuf::as_path);
        let workload = load(file);
        let name = short_name(file);
        let json_path = out_dir.join(format!("dhat-{phase_name}-{name}.json"));
        eprintln!("heap-profile: phase={}, input={}", phase_name, name);

        let _profiler = dhat::Profiler::builder().file_name(json_path).build();
        profile(&workload, phase);
        return;
    }

    if aggregate {
        let json_path = out_dir.join(format!("dhat-{phase_name}.json"));
        eprintln!(
            "heap-profile: phase={}, files={} (aggregate), out={}",
            phase_name,
            files.len(),
            out_dir.display()
        );
        let workloads: Vec<Workload> = files.iter().map(|f| load(Some(f))).collect();

        let _profiler = dhat::Profiler::builder()
            .file_name(json_path.clone())
            .build();
        for (file, workload) in files.iter().zip(&workloads) {
            eprintln!("  profiling: {}", file.display());
            profile(workload, phase);
        }
        eprintln!(
            "Done. Open {} in https://nnethercote.github.io/dh_view/dh_view.html",
            json_path.display()
        );
        return;
    }

    let self_exe = std::env::current_exe().unwrap_or_else(|e| {
        eprintln!("Failed to determine own executable path: {}", e);
        std::process::exit(1);
    });

    eprintln!(
        "heap-profile: phase={}, files={} (per-file), out={}",
        phase_name,
        files.len(),
        out_dir.display()
    );

    let mut any_failed = false;
    for file in &files {
        let name = short_name(Some(file));
        eprintln!(
            "  profiling: {} -> dhat-{}-{}.json",
            file.display(),
            phase_name,
            name
        );
        let status = Command::new(&self_exe)
            .arg("--single-file")
            .arg("--phase")
            .arg(phase_name)
            .arg("--out-dir")
            .arg(&out_dir)
            .arg(file)
            .status();
        match status {
            Ok(s) if s.success() => {}
            Ok(s) => {
                eprintln!("    FAILED (exit {})", s.code().unwrap_or(-1));
                any_failed = true;
            }
            Err(e) => {
                eprintln!("    FAILED to spawn: {}", e);
                any_failed = true;
            }
        }
    }

    eprintln!();
    eprintln!("Open profiles from {} in https://nnethercote.github.io/dh_view/dh_view.html", out_dir.display());
    if any_failed {
        std::process::exit(1);
    }
}
