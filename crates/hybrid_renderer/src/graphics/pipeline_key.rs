//! Structured pipeline keys and the memoizing cache built on them
//!
//! A pipeline is fully determined by its key: two materials with the same
//! set of maps and switches share one pipeline.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::hash::Hash;

use super::desc::MaterialFlags;

/// Key of a gbuffer (depth pass) pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GBufferPipelineKey {
    /// Which material maps are bound
    pub maps: MaterialFlags,
    /// No back-face culling
    pub double_sided: bool,
    /// Line rasterization
    pub wireframe: bool,
}

impl GBufferPipelineKey {
    /// Key for a material's flags
    pub fn from_flags(flags: MaterialFlags) -> Self {
        Self {
            maps: flags.maps(),
            double_sided: flags.contains(MaterialFlags::DOUBLE_SIDED),
            wireframe: flags.contains(MaterialFlags::WIREFRAME),
        }
    }
}

/// Key of a forward pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ForwardPipelineKey {
    /// Which material maps are bound
    pub maps: MaterialFlags,
    /// Alpha blended, no depth writes
    pub translucent: bool,
    /// No back-face culling
    pub double_sided: bool,
    /// Line rasterization
    pub wireframe: bool,
    /// Sample the shadow cascades
    pub shadows: bool,
}

impl ForwardPipelineKey {
    /// Key for a material's flags in a view with or without shadows
    pub fn from_flags(flags: MaterialFlags, shadows: bool) -> Self {
        Self {
            maps: flags.maps(),
            translucent: flags.contains(MaterialFlags::TRANSLUCENT),
            double_sided: flags.contains(MaterialFlags::DOUBLE_SIDED),
            wireframe: flags.contains(MaterialFlags::WIREFRAME),
            shadows,
        }
    }
}

/// Memoizes pipelines by key; entries live as long as the cache
#[derive(Debug)]
pub struct PipelineCache<K, P> {
    entries: HashMap<K, P>,
}

impl<K, P> Default for PipelineCache<K, P> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Copy, P> PipelineCache<K, P> {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached pipeline for `key`, building and inserting it on a miss
    pub fn get_or_try_insert_with<E>(
        &mut self,
        key: K,
        build: impl FnOnce(&K) -> Result<P, E>,
    ) -> Result<&P, E> {
        match self.entries.entry(key) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let pipeline = build(&key)?;
                Ok(entry.insert(pipeline))
            }
        }
    }

    /// Cached pipeline, if built
    pub fn get(&self, key: &K) -> Option<&P> {
        self.entries.get(key)
    }

    /// Number of cached pipelines
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been built yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return every pipeline
    pub fn drain(&mut self) -> impl Iterator<Item = P> + '_ {
        self.entries.drain().map(|(_, pipeline)| pipeline)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_once_per_key() {
        let mut cache: PipelineCache<ForwardPipelineKey, u32> = PipelineCache::new();
        let mut builds = 0;
        let opaque = ForwardPipelineKey::from_flags(MaterialFlags::ALBEDO_MAP, true);
        let translucent =
            ForwardPipelineKey::from_flags(MaterialFlags::ALBEDO_MAP | MaterialFlags::TRANSLUCENT, true);

        for key in [opaque, opaque, translucent, opaque] {
            cache
                .get_or_try_insert_with(key, |_| {
                    builds += 1;
                    Ok::<_, ()>(builds)
                })
                .unwrap();
        }
        assert_eq!(builds, 2);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&opaque), Some(&1));
    }

    #[test]
    fn test_failed_build_caches_nothing() {
        let mut cache: PipelineCache<GBufferPipelineKey, u32> = PipelineCache::new();
        let key = GBufferPipelineKey::from_flags(MaterialFlags::empty());
        let result = cache.get_or_try_insert_with(key, |_| Err("no shader"));
        assert_eq!(result, Err("no shader"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_keys_ignore_irrelevant_flags() {
        let a = GBufferPipelineKey::from_flags(MaterialFlags::TRANSLUCENT | MaterialFlags::NORMAL_MAP);
        let b = GBufferPipelineKey::from_flags(MaterialFlags::NORMAL_MAP);
        assert_eq!(a, b);
        let shadowed = ForwardPipelineKey::from_flags(MaterialFlags::empty(), true);
        let unshadowed = ForwardPipelineKey::from_flags(MaterialFlags::empty(), false);
        assert_ne!(shadowed, unshadowed);
    }
}
