use std::collections::HashMap;
use std::hash::Hash;

use crate::aggregator::Histogram;

/*
 * The struct definitions below follow the speedscope file format as used by rbspy.
 * https://github.com/rbspy/rbspy/blob/d408b12dfc906292e1e85e6152a38416ed3a18e5/src/ui/speedscope.rs
 *
 * The TypeScript definitions that define this file format can be found here:
 * https://github.com/jlfwong/speedscope/blob/9d13d9/src/lib/file-format-spec.ts
 *
 * Only the "type: sampled" variant is produced. A histogram has no timing, so each distinct
 * stack becomes one sample weighted by how often it was seen.
 */

#[derive(Debug, Serialize)]
pub struct SpeedscopeFile {
    #[serde(rename = "$schema")]
    schema: String,
    profiles: Vec<Profile>,
    shared: Shared,

    #[serde(rename = "activeProfileIndex")]
    active_profile_index: Option<f64>,

    exporter: Option<String>,

    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct Profile {
    #[serde(rename = "type")]
    profile_type: ProfileType,

    name: String,
    unit: ValueUnit,

    #[serde(rename = "startValue")]
    start_value: f64,

    #[serde(rename = "endValue")]
    end_value: f64,

    samples: Vec<Vec<usize>>,
    weights: Vec<f64>,
}

#[derive(Debug, Serialize)]
struct Shared {
    frames: Vec<Frame>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Frame {
    pub name: String,
}

#[derive(Debug, Serialize)]
enum ProfileType {
    #[serde(rename = "sampled")]
    Sampled,
}

#[derive(Debug, Serialize)]
enum ValueUnit {
    #[serde(rename = "none")]
    None,
}

/// A list of unique items where each item keeps the index it was first inserted at.
struct VecHashMap<V>
where
    V: Hash + Eq + Clone,
{
    vec: Vec<V>,
    map: HashMap<V, usize>,
}

impl<V> VecHashMap<V>
where
    V: Hash + Eq + Clone,
{
    fn new() -> VecHashMap<V> {
        VecHashMap {
            vec: Vec::new(),
            map: HashMap::new(),
        }
    }

    fn get_or_insert(&mut self, item: V) -> usize {
        if let Some(index) = self.map.get(&item) {
            return *index;
        }
        self.vec.push(item.clone());
        let index = self.vec.len() - 1;
        self.map.insert(item, index);
        index
    }

    fn into_vec(self) -> Vec<V> {
        self.vec
    }
}

impl SpeedscopeFile {
    pub fn from_histogram(histogram: &Histogram, name: &str) -> SpeedscopeFile {
        let mut frames = VecHashMap::new();
        let mut samples = Vec::with_capacity(histogram.len());
        let mut weights = Vec::with_capacity(histogram.len());

        for (symbols, count) in histogram.stacks() {
            samples.push(
                symbols
                    .iter()
                    .map(|name| frames.get_or_insert(name.clone()))
                    .collect(),
            );
            weights.push(count as f64);
        }

        let end_value: f64 = weights.iter().sum();
        SpeedscopeFile {
            // This is always the same
            schema: "https://www.speedscope.app/file-format-schema.json".to_string(),

            active_profile_index: None,

            name: Some(name.to_string()),

            exporter: Some(format!("pmp@{}", env!("CARGO_PKG_VERSION"))),

            profiles: vec![Profile {
                profile_type: ProfileType::Sampled,
                name: name.to_string(),
                unit: ValueUnit::None,
                start_value: 0.0,
                end_value,
                samples,
                weights,
            }],

            shared: Shared {
                frames: frames
                    .into_vec()
                    .into_iter()
                    .map(|name| Frame { name })
                    .collect(),
            },
        }
    }
}
