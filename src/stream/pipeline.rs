//! Pipeline construction from ordered layer descriptors

use serde::{Deserialize, Serialize};

use super::{
    ArrayStream, FirStream, MultiplyStream, SineStream, StoreReaderStream, Stream, StreamError,
    StreamResult, STREAM_BUFFER_LEN,
};
use crate::registry::StoreRegistry;

/// One layer of a stream pipeline, as supplied by the transport layer.
///
/// The first layer must be a source; every following layer wraps the pipeline
/// built so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LayerSpec {
    /// Read blocks `[start_block, end_block)` from a registered store.
    StoreReader {
        name: String,
        path: String,
        start_block: u32,
        end_block: u32,
    },
    /// Complex oscillator source.
    Oscillator { phase: f32, frequency: f32, scale: f32 },
    /// Fixed sample sequence source.
    ArraySource { samples: Vec<f32> },
    /// Multiply the pipeline by a unit oscillator at a relative frequency.
    FrequencyTranslate { phase: f32, relative_frequency: f32 },
    /// FIR-filter the pipeline; taps are interleaved I/Q pairs when complex.
    FirFilter { taps: Vec<f32>, is_complex: bool },
}

impl LayerSpec {
    fn is_source(&self) -> bool {
        matches!(
            self,
            LayerSpec::StoreReader { .. }
                | LayerSpec::Oscillator { .. }
                | LayerSpec::ArraySource { .. }
        )
    }
}

fn validate_taps(taps: &[f32], is_complex: bool) -> StreamResult<()> {
    if taps.is_empty() {
        return Err(StreamError::InvalidTaps("no taps given".into()));
    }
    if is_complex && taps.len() % 2 != 0 {
        return Err(StreamError::InvalidTaps(
            "complex taps must be interleaved I/Q pairs".into(),
        ));
    }
    if taps.len() > STREAM_BUFFER_LEN / 2 {
        return Err(StreamError::InvalidTaps(format!(
            "{} taps exceed the filter window",
            taps.len()
        )));
    }
    Ok(())
}

/// Builds a pipeline bottom-up from ordered layer descriptors.
///
/// Store-reader layers resolve their store against `stores` and hold a handle
/// to it for the pipeline's lifetime. On any failure the partially built
/// pipeline is dropped, which releases every layer constructed so far.
pub fn build_pipeline(layers: &[LayerSpec], stores: &StoreRegistry) -> StreamResult<Stream> {
    let mut pipeline: Option<Stream> = None;

    for layer in layers {
        if pipeline.is_some() && layer.is_source() {
            return Err(StreamError::MisplacedSource);
        }
        if pipeline.is_none() && !layer.is_source() {
            return Err(StreamError::FirstLayerNotSource);
        }

        let built = match layer {
            LayerSpec::StoreReader {
                name,
                path,
                start_block,
                end_block,
            } => {
                let store = stores
                    .find(name, path)
                    .ok_or_else(|| StreamError::StoreNotFound {
                        name: name.clone(),
                        path: path.clone(),
                    })?;
                Stream::StoreReader(StoreReaderStream::new(
                    std::rc::Rc::clone(store),
                    *start_block,
                    *end_block,
                ))
            }
            LayerSpec::Oscillator {
                phase,
                frequency,
                scale,
            } => Stream::Sine(SineStream::new(*phase, *frequency, *scale)),
            LayerSpec::ArraySource { samples } => {
                Stream::Array(ArrayStream::new(samples.clone()))
            }
            LayerSpec::FrequencyTranslate {
                phase,
                relative_frequency,
            } => {
                let oscillator = Stream::Sine(SineStream::new(*phase, *relative_frequency, 1.0));
                let parent = pipeline.take().ok_or(StreamError::FirstLayerNotSource)?;
                Stream::Multiply(Box::new(MultiplyStream::new(parent, oscillator)))
            }
            LayerSpec::FirFilter { taps, is_complex } => {
                validate_taps(taps, *is_complex)?;
                let parent = pipeline.take().ok_or(StreamError::FirstLayerNotSource)?;
                Stream::Fir(Box::new(FirStream::new(parent, taps.clone(), *is_complex)))
            }
        };
        pipeline = Some(built);
    }

    let mut pipeline = pipeline.ok_or(StreamError::EmptyPipeline)?;
    pipeline.seek(0);
    Ok(pipeline)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::{Block, BlockType};
    use crate::registry::StoreRegistry;
    use crate::store::{Store, WriteOffset};

    fn registry_with_samples() -> StoreRegistry {
        let handle = Store::memory(2).unwrap().into_handle();
        let mut block = Block::with_type(BlockType::F32);
        let samples: Vec<f32> = (0..64).map(|i| i as f32).collect();
        block.set_f32_samples(&samples);
        handle
            .borrow_mut()
            .write_block(&mut block, WriteOffset::Append)
            .unwrap();

        let mut stores = StoreRegistry::new();
        stores.add("samples", "", handle).unwrap();
        stores
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        let stores = StoreRegistry::new();
        assert_eq!(
            build_pipeline(&[], &stores).err(),
            Some(StreamError::EmptyPipeline)
        );
    }

    #[test]
    fn test_first_layer_must_be_source() {
        let stores = StoreRegistry::new();
        let layers = [LayerSpec::FirFilter {
            taps: vec![1.0],
            is_complex: false,
        }];
        assert_eq!(
            build_pipeline(&layers, &stores).err(),
            Some(StreamError::FirstLayerNotSource)
        );
    }

    #[test]
    fn test_source_must_not_follow() {
        let stores = StoreRegistry::new();
        let layers = [
            LayerSpec::ArraySource {
                samples: vec![1.0, 0.0],
            },
            LayerSpec::Oscillator {
                phase: 0.0,
                frequency: 0.1,
                scale: 1.0,
            },
        ];
        assert_eq!(
            build_pipeline(&layers, &stores).err(),
            Some(StreamError::MisplacedSource)
        );
    }

    #[test]
    fn test_unknown_store_fails_composition() {
        let stores = StoreRegistry::new();
        let layers = [LayerSpec::StoreReader {
            name: "absent".into(),
            path: "".into(),
            start_block: 0,
            end_block: 1,
        }];
        assert!(matches!(
            build_pipeline(&layers, &stores),
            Err(StreamError::StoreNotFound { .. })
        ));
    }

    #[test]
    fn test_invalid_taps_rejected_and_partial_pipeline_released() {
        let stores = registry_with_samples();
        let layers = [
            LayerSpec::StoreReader {
                name: "samples".into(),
                path: "".into(),
                start_block: 0,
                end_block: 1,
            },
            LayerSpec::FirFilter {
                taps: vec![],
                is_complex: false,
            },
        ];
        assert!(matches!(
            build_pipeline(&layers, &stores),
            Err(StreamError::InvalidTaps(_))
        ));

        // The partially built reader released its store handle.
        let handle = stores.find("samples", "").unwrap();
        assert_eq!(std::rc::Rc::strong_count(handle), 1);
    }

    #[test]
    fn test_reader_filter_pipeline_reads() {
        let stores = registry_with_samples();
        let layers = [
            LayerSpec::StoreReader {
                name: "samples".into(),
                path: "".into(),
                start_block: 0,
                end_block: 1,
            },
            LayerSpec::FirFilter {
                taps: vec![1.0],
                is_complex: false,
            },
        ];
        let mut stream = build_pipeline(&layers, &stores).unwrap();

        let mut out = [0.0f32; 8];
        assert_eq!(stream.read(&mut out), 8);
        assert_eq!(out, [0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
    }

    #[test]
    fn test_frequency_translate_round_trip() {
        // Translate by f then by -f: the oscillators cancel and the original
        // samples come back, up to float tolerance.
        let samples: Vec<f32> = (0..32).map(|i| (i as f32) / 16.0).collect();
        let layers = [
            LayerSpec::ArraySource {
                samples: samples.clone(),
            },
            LayerSpec::FrequencyTranslate {
                phase: 0.0,
                relative_frequency: 0.1,
            },
            LayerSpec::FrequencyTranslate {
                phase: 0.0,
                relative_frequency: -0.1,
            },
        ];
        let stores = StoreRegistry::new();
        let mut stream = build_pipeline(&layers, &stores).unwrap();

        let mut out = [0.0f32; 32];
        assert_eq!(stream.read(&mut out), 32);
        for (got, want) in out.iter().zip(&samples) {
            assert!((got - want).abs() < 1e-5, "{} vs {}", got, want);
        }
    }
}
