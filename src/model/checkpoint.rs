//! Save/load a `LayerChain` as a directory of `burn` NamedMpk files plus a
//! small manifest describing the chain's shape.
//!
//! One `.mpk` per layer (`{base}/layer_{i}.mpk`), matching the CLI's `-l`/
//! `-s` flags. A companion `shape.txt` records each layer's kind and
//! dimensions so `load_chain` can reconstruct the same architecture before
//! handing weights to `burn`'s recorder.

use std::fs;
use std::path::{Path, PathBuf};

use burn::record::{FullPrecisionSettings, NamedMpkFileRecorder};

use crate::error::{Error, Result};
use crate::layers::{Activation, Dense, Lstm, LayerChain, LayerKind};

fn io_err(path: &Path, source: std::io::Error) -> Error {
    Error::IoFailure {
        path: path.to_path_buf(),
        source,
    }
}

/// Persist `chain` under directory `dir` (created if missing).
pub fn save_chain(chain: &LayerChain, dir: &Path) -> Result<()> {
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();

    let mut shape_lines = Vec::new();
    for (i, layer) in chain.layers.iter().enumerate() {
        let path = dir.join(format!("layer_{i}"));
        match layer {
            LayerKind::Dense(d) => {
                shape_lines.push(format!("dense {} {}", d.in_dim(), d.out_dim()));
                d.clone()
                    .save_file(path.clone(), &recorder)
                    .map_err(|e| malformed_save(&path, e))?;
            }
            LayerKind::Lstm(l) => {
                shape_lines.push(format!("lstm {} {}", l.in_dim(), l.hidden()));
                l.clone()
                    .save_file(path.clone(), &recorder)
                    .map_err(|e| malformed_save(&path, e))?;
            }
        }
    }

    let shape_path = dir.join("shape.txt");
    fs::write(&shape_path, shape_lines.join("\n")).map_err(|e| io_err(&shape_path, e))?;
    Ok(())
}

/// Load a chain previously saved by `save_chain`.
pub fn load_chain(dir: &Path) -> Result<LayerChain> {
    let shape_path = dir.join("shape.txt");
    let shape_text = fs::read_to_string(&shape_path).map_err(|e| io_err(&shape_path, e))?;
    let recorder = NamedMpkFileRecorder::<FullPrecisionSettings>::new();
    let device = Default::default();

    let mut layers = Vec::new();
    for (i, line) in shape_text.lines().enumerate() {
        let mut parts = line.split_whitespace();
        let kind = parts.next().unwrap_or("");
        let path = dir.join(format!("layer_{i}"));
        match kind {
            "dense" => {
                let in_dim: usize = parts.next().unwrap_or("0").parse().unwrap_or(0);
                let out_dim: usize = parts.next().unwrap_or("0").parse().unwrap_or(0);
                let model = Dense::new(in_dim, out_dim, Activation::Softmax)
                    .load_file(path.clone(), &recorder, &device)
                    .map_err(|e| malformed_load(&path, e))?;
                layers.push(LayerKind::Dense(model));
            }
            "lstm" => {
                let in_dim: usize = parts.next().unwrap_or("0").parse().unwrap_or(0);
                let hidden: usize = parts.next().unwrap_or("0").parse().unwrap_or(0);
                let model = Lstm::new(in_dim, hidden)
                    .load_file(path.clone(), &recorder, &device)
                    .map_err(|e| malformed_load(&path, e))?;
                layers.push(LayerKind::Lstm(model));
            }
            other => {
                return Err(Error::MalformedInput {
                    line: i + 1,
                    detail: format!("unknown layer kind '{other}' in shape.txt"),
                })
            }
        }
    }

    Ok(LayerChain::new(layers))
}

fn malformed_save(path: &PathBuf, e: impl std::fmt::Display) -> Error {
    Error::IoFailure {
        path: path.clone(),
        source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
    }
}

fn malformed_load(path: &PathBuf, e: impl std::fmt::Display) -> Error {
    Error::IoFailure {
        path: path.clone(),
        source: std::io::Error::new(std::io::ErrorKind::Other, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::build_chain;
    use tempfile::tempdir;

    #[test]
    fn round_trips_chain_shape() {
        let chain = build_chain(4, &[6], 3);
        let dir = tempdir().unwrap();
        save_chain(&chain, dir.path()).unwrap();
        let loaded = load_chain(dir.path()).unwrap();
        assert_eq!(loaded.layers.len(), chain.layers.len());
    }
}
