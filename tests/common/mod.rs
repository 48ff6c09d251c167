//! Throwaway SemEval-shaped dataset trees for integration tests

#![allow(dead_code)]

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub const TRAIN_ROWS: usize = 24;
pub const TEST_ROWS: usize = 12;
pub const FOLDS: usize = 2;

const LABELS: [&str; 3] = ["positive", "negative", "neutral"];

pub fn label(row: usize) -> &'static str {
    LABELS[row % 3]
}

fn text(row: usize) -> String {
    match label(row) {
        "positive" => format!("what a great happy day number{row}"),
        "negative" => format!("this is awful and sad number{row}"),
        _ => format!("the bus leaves at noon number{row}"),
    }
}

/// Signal per class plus a little row-dependent noise.
pub fn signal(row: usize, dim: usize) -> f64 {
    let base = match label(row) {
        "positive" => 1.0,
        "negative" => -1.0,
        _ => 0.0,
    };
    base * (dim as f64 + 1.0) + ((row * 13 + dim * 7) % 10) as f64 * 0.01
}

fn write(path: &Path, content: &str) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

fn split_rows() -> [(&'static str, std::ops::Range<usize>); 2] {
    [("train", 0..TRAIN_ROWS), ("test", TRAIN_ROWS..TRAIN_ROWS + TEST_ROWS)]
}

fn write_encoded(dir: &Path, stem: &str, dims: usize) {
    for (part, rows) in split_rows() {
        let mut csv = String::from("row");
        for d in 0..dims {
            write!(csv, ",{d}").unwrap();
        }
        csv.push_str(",sentiment,dummy_id\n");
        for (i, row) in rows.enumerate() {
            write!(csv, "{i}").unwrap();
            for d in 0..dims {
                write!(csv, ",{:.3}", signal(row, d)).unwrap();
            }
            writeln!(csv, ",{},{}", label(row), 1000 + row).unwrap();
        }
        write(&dir.join(format!("{stem}{part}.csv")), &csv);
    }
}

/// Build labels plus LIWC, SEANCE, pooled and per-fold encoder files under
/// `root`, and return the path of a matching experiment.toml.
pub fn build_dataset(root: &Path) -> PathBuf {
    let data = root.join("semeval_data");
    let embeddings = data.join("embeddings");

    for (part, rows) in split_rows() {
        let mut csv = String::from("id,text,sentiment\n");
        for row in rows.clone() {
            writeln!(csv, "{row},{},{}", text(row), label(row)).unwrap();
        }
        write(&data.join(format!("source_data/sem{part}.csv")), &csv);

        let mut liwc = String::from("A,B,C,WC,posemo,negemo\n");
        for row in rows.clone() {
            writeln!(
                liwc,
                "{row},{},\"{}\",6,{:.2},{:.2}",
                label(row),
                text(row),
                signal(row, 0).max(0.0) * 20.0,
                (-signal(row, 0)).max(0.0) * 20.0
            )
            .unwrap();
        }
        write(&embeddings.join(format!("LIWC2015_semeval_{part}.csv")), &liwc);

        // SEANCE rows come out of order; sorting by filename restores them
        let mut seance = String::from("filename,vader_pos,vader_neg\n");
        for row in rows.rev() {
            writeln!(
                seance,
                "tweet_{row:04}.txt,{:.3},{:.3}",
                signal(row, 1).max(0.0),
                (-signal(row, 1)).max(0.0)
            )
            .unwrap();
        }
        write(&embeddings.join(format!("seance_semeval_{part}.csv")), &seance);
    }

    write_encoded(&embeddings, "USE_encoded_sentences", 4);
    for fold in 0..FOLDS {
        write_encoded(&embeddings, &format!("fasttext_encoded_sentences_{fold}"), 3);
    }

    let config = format!(
        r#"[dataset]
name = "semeval"
root = "{root}"

[folds]
count = {FOLDS}
train_row_count = {TRAIN_ROWS}

[classifier]
estimators = 5
learning_rate = 0.3
max_depth = 3
subsample = 1.0
colsample = 1.0
kinds = ["majority", "gaussian_nb"]

[output]
results_dir = "{results}"

[explain]
samples = 6
background = 10

[[language_models]]
name = "Term Frequency"
kind = "term_frequency"
max_features = 20

[[language_models]]
name = "LIWC"
kind = "lexicon"
source = "LIWC2015_{{dataset}}_"
features = ["WC", "posemo", "negemo"]
rename = {{ B = "liwc_sent", C = "text_liwc" }}

[[language_models]]
name = "SEANCE"
kind = "sorted_lexicon"
source = "seance_{{dataset}}_"
sort_by = "filename"

[[language_models]]
name = "Universal Sentence Encoder"
kind = "pooled_embedding"
source = "USE_encoded_sentences"

[[language_models]]
name = "FastText_lstm"
kind = "fold_embedding"
source = "fasttext_encoded_sentences_{{fold}}"
"#,
        root = toml_path(&data),
        results = toml_path(&root.join("results")),
    );
    let path = root.join("experiment.toml");
    write(&path, &config);
    path
}

/// Forward slashes keep TOML basic strings valid on every platform.
fn toml_path(path: &Path) -> String {
    path.display().to_string().replace('\\', "/")
}
