use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::ingest::hasher;
use crate::screens::selector::Selection;

/// Hand-off record for the uploader, one entry per selected screenshot.
#[derive(Debug, Serialize)]
pub struct ManifestEntry {
    pub rank: usize,
    pub path: PathBuf,
    pub file_size: u64,
    pub sha256: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreBreakdown>,
}

#[derive(Debug, Serialize)]
pub struct ScoreBreakdown {
    pub total: f64,
    pub file_size: f64,
    pub quality: f64,
    pub sharpness: f64,
}

pub fn build_manifest(selection: &Selection) -> Result<Vec<ManifestEntry>> {
    selection
        .picks
        .iter()
        .enumerate()
        .map(|(i, pick)| {
            Ok(ManifestEntry {
                rank: i + 1,
                path: pick.candidate.path.clone(),
                file_size: pick.candidate.file_size,
                sha256: hasher::calculate_hash(&pick.candidate.path)?,
                score: pick.score.map(|s| ScoreBreakdown {
                    total: s.total(),
                    file_size: s.fs_score,
                    quality: s.quality_score,
                    sharpness: s.sharpness_score,
                }),
            })
        })
        .collect()
}

pub fn write_manifest(path: &Path, selection: &Selection) -> Result<()> {
    let entries = build_manifest(selection)?;
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, &entries)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screens::prune::CandidateImage;
    use crate::screens::selector::{ImageScore, Pick};
    use std::fs;

    #[test]
    fn test_manifest_lists_picks_in_rank_order() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("pre_004.png");
        let second = dir.path().join("pre_001.png");
        fs::write(&first, b"abc").unwrap();
        fs::write(&second, b"").unwrap();

        let selection = Selection {
            picks: vec![
                Pick {
                    candidate: CandidateImage {
                        discovery_index: 3,
                        path: first.clone(),
                        file_size: 3,
                        max_file_size: 3,
                    },
                    score: Some(ImageScore {
                        fs_score: 25.0,
                        quality_score: 40.0,
                        sharpness_score: 10.0,
                    }),
                },
                Pick {
                    candidate: CandidateImage {
                        discovery_index: 0,
                        path: second.clone(),
                        file_size: 0,
                        max_file_size: 3,
                    },
                    score: None,
                },
            ],
            ..Selection::default()
        };

        let out = dir.path().join("selection.json");
        write_manifest(&out, &selection).unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&out).unwrap()).unwrap();

        assert_eq!(json[0]["rank"], 1);
        assert_eq!(json[0]["path"], first.to_string_lossy().into_owned());
        assert_eq!(
            json[0]["sha256"],
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(json[0]["score"]["total"], 75.0);
        assert_eq!(json[1]["rank"], 2);
        assert!(json[1].get("score").is_none());
    }
}
