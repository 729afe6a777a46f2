//! Grouped view of a clustering run, for people and for other tools.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::cluster::NOISE;
use crate::error::{Error, Result};
use crate::label::ClusterSummary;
use crate::message::Message;

/// Line written between members in the text export.
pub const RULE_LINE: &str = "=========================";

/// One cluster in a [`ClusterReport`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterGroup {
    pub id: usize,
    pub noise: bool,
    pub count: usize,
    /// Input indices of the members, ascending.
    pub indices: Vec<usize>,
    pub terms: Vec<String>,
    /// Member texts; only present for verbose reports.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub members: Option<Vec<String>>,
    #[serde(skip)]
    texts: Vec<String>,
}

/// Clusters sorted by id, with noise (if any) last.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClusterReport {
    pub clusters: Vec<ClusterGroup>,
    /// Silhouette coefficient of the partition, when defined.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub silhouette: Option<f64>,
    /// Inputs left out of the run because they could not be decoded.
    pub skipped: usize,
}

impl ClusterReport {
    /// Group `messages` by their entry in `assignment`.
    ///
    /// Summaries missing for a cluster yield an empty term list.
    pub fn build(
        assignment: &[usize],
        messages: &[Message],
        summaries: &BTreeMap<usize, ClusterSummary>,
        verbose: bool,
    ) -> Result<Self> {
        if assignment.len() != messages.len() {
            return Err(Error::DimensionMismatch {
                expected: assignment.len(),
                found: messages.len(),
            });
        }
        let mut grouped: BTreeMap<usize, Vec<&Message>> = BTreeMap::new();
        for (message, &id) in messages.iter().zip(assignment) {
            grouped.entry(id).or_default().push(message);
        }

        let clusters = grouped
            .into_iter()
            .map(|(id, mut members)| {
                members.sort_by_key(|m| m.index);
                let texts: Vec<String> = members.iter().map(|m| m.text.clone()).collect();
                ClusterGroup {
                    id,
                    noise: id == NOISE,
                    count: members.len(),
                    indices: members.iter().map(|m| m.index).collect(),
                    terms: summaries
                        .get(&id)
                        .map(|s| s.terms.clone())
                        .unwrap_or_default(),
                    members: verbose.then(|| texts.clone()),
                    texts,
                }
            })
            .collect();

        Ok(Self {
            clusters,
            silhouette: None,
            skipped: 0,
        })
    }

    pub fn with_silhouette(mut self, silhouette: Option<f64>) -> Self {
        self.silhouette = silhouette;
        self
    }

    pub fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped = skipped;
        self
    }

    /// Number of non-noise clusters.
    pub fn n_clusters(&self) -> usize {
        self.clusters.iter().filter(|c| !c.noise).count()
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Other(e.to_string()))
    }

    /// Write one `label-<id>.txt` file per cluster into `dir`.
    ///
    /// Each member text is followed by a blank line, the rule line and another
    /// blank line. The noise group is written to `label-noise.txt`.
    pub fn write_text_export(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::with_capacity(self.clusters.len());
        for group in &self.clusters {
            let name = if group.noise {
                "label-noise.txt".to_string()
            } else {
                format!("label-{}.txt", group.id)
            };
            let mut body = String::new();
            for text in &group.texts {
                body.push_str(text);
                body.push_str("\n\n");
                body.push_str(RULE_LINE);
                body.push_str("\n\n");
            }
            let path = dir.join(name);
            fs::write(&path, body)?;
            written.push(path);
        }
        tracing::debug!(dir = %dir.display(), files = written.len(), "wrote text export");
        Ok(written)
    }
}

impl fmt::Display for ClusterReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for group in &self.clusters {
            if group.noise {
                write!(f, "Noise has {} error messages", group.count)?;
            } else {
                write!(f, "Label {} has {} error messages", group.id, group.count)?;
            }
            if !group.terms.is_empty() {
                write!(f, " [{}]", group.terms.join(", "))?;
            }
            writeln!(f)?;
            if let Some(members) = &group.members {
                for m in members {
                    writeln!(f, "    {m}")?;
                }
            }
        }
        if let Some(s) = self.silhouette {
            writeln!(f, "Silhouette score: {s:.2}")?;
        }
        if self.skipped > 0 {
            writeln!(f, "Skipped {} undecodable messages", self.skipped)?;
        }
        Ok(())
    }
}
