//! The training orchestrator: joint optimization of the two weighting
//! networks against a frozen denoising model.
//!
//! Per optimizer step:
//!
//! 1. **COMPOSE**: run both gates over their candidate matrices, mask
//!    the object weights by part-of-speech, compose the two embeddings,
//!    and write them into the live table's placeholder rows.
//! 2. **FORWARD**: encode the image batch to latents, add sampled noise
//!    at random timesteps, and run the denoiser twice: once conditioned
//!    on the template containing both placeholders, once on the template
//!    containing only the object placeholder.
//! 3. **BACKWARD/STEP**: backpropagate the composite loss into the two
//!    weighting networks only, stepping each with its own learning rate.
//! 4. **RESTORE**: overwrite every non-placeholder table row from the
//!    frozen snapshot. This undoes any incidental gradient update the
//!    backward pass applied elsewhere and is the correctness-critical
//!    invariant of the whole loop.
//!
//! Loss = MSE(pred_both, target) + MSE(pred_obj, target)
//!      + λ·(1 − cos(explanation-subset embedding, full object embedding))
//!
//! with λ = 1e-3 and the target chosen by the backend's declared
//! parameterization (noise, or velocity).

use std::path::PathBuf;

use candle_core::{DType, Device, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarBuilder, VarMap};
use lexi_core::{CandidateVocabulary, EmbeddingTable, LexiError, Slot};
use lexi_gate::filter::{noun_mask, top_k_indices};
use lexi_gate::pos::PosTagger;
use lexi_gate::{cosine_similarity, Composer, Conditioning, DiffusionBackend, PredictionKind, WeightNet};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::checkpoint::save_checkpoint;
use crate::rng::SimpleRng;
use crate::schedule::{LrSchedule, LrScheduleKind};

/// Configuration for one training run.
///
/// Defaults mirror the reference recipe: a 500-word object vocabulary, a
/// 50-token explanation subset, a 10-word attribute subset, and 30
/// optimizer steps.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    /// Identifier of the frozen pretrained model (provenance only).
    pub model_id: String,

    /// Output directory for the checkpoint and run config.
    pub output_dir: PathBuf,

    /// Path of the persisted vocabulary similarity blob (provenance;
    /// consumed by the indexing stage before the trainer is built).
    pub vocab_encodings: PathBuf,

    /// Path of the curated attribute word list (provenance, as above).
    pub attr_words: PathBuf,

    /// Size of the ranked object candidate vocabulary (default: 500).
    pub vocabulary_size: usize,

    /// Explanation-subset size K over masked object weights (default: 50).
    pub explanation_tokens: usize,

    /// Attribute-subset size M used for the composed attribute (default: 10).
    pub attr_take: usize,

    /// Steps between validation records; 0 disables (default: 10).
    pub validation_interval: usize,

    /// Learning rate for the attribute network (default: 1e-2).
    pub learning_rate_attr: f64,

    /// Learning rate for the object network (default: 1e-3).
    pub learning_rate_obj: f64,

    /// Total optimizer steps; training stops here mid-epoch (default: 30).
    pub max_train_steps: usize,

    /// Upper bound on epochs over the batch sequence (default: 1000).
    pub num_epochs: usize,

    /// Batch size the data pipeline was built with (default: 6).
    pub train_batch_size: usize,

    /// Seed for parameter initialization, timestep and noise sampling
    /// (default: 1000).
    pub seed: u64,

    /// Hidden width of both weighting networks (default: 512).
    pub hidden_dim: usize,

    /// Weight λ of the explanation-consistency term (default: 1e-3).
    pub consistency_weight: f64,

    /// AdamW beta1 (default: 0.9).
    pub adam_beta1: f64,

    /// AdamW beta2 (default: 0.999).
    pub adam_beta2: f64,

    /// AdamW weight decay (default: 1e-2).
    pub adam_weight_decay: f64,

    /// AdamW epsilon (default: 1e-8).
    pub adam_epsilon: f64,

    /// Micro-batches averaged into one optimizer step (default: 1).
    pub gradient_accumulation_steps: usize,

    /// Post-warmup learning-rate curve (default: constant).
    pub lr_schedule: LrScheduleKind,

    /// Learning-rate warmup steps (default: 0).
    pub lr_warmup_steps: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            model_id: String::new(),
            output_dir: PathBuf::from("output"),
            vocab_encodings: PathBuf::from("vocab_encodings.safetensors"),
            attr_words: PathBuf::from("attr_words.txt"),
            vocabulary_size: 500,
            explanation_tokens: 50,
            attr_take: 10,
            validation_interval: 10,
            learning_rate_attr: 1e-2,
            learning_rate_obj: 1e-3,
            max_train_steps: 30,
            num_epochs: 1000,
            train_batch_size: 6,
            seed: 1000,
            hidden_dim: 512,
            consistency_weight: 1e-3,
            adam_beta1: 0.9,
            adam_beta2: 0.999,
            adam_weight_decay: 1e-2,
            adam_epsilon: 1e-8,
            gradient_accumulation_steps: 1,
            lr_schedule: LrScheduleKind::Constant,
            lr_warmup_steps: 0,
        }
    }
}

/// The two tokenized template sentences used for conditioning.
///
/// `both` must contain the attribute and the object placeholder ids;
/// `object_only` must contain the object id and not the attribute id.
#[derive(Debug, Clone)]
pub struct Templates {
    /// Template mentioning both placeholders ("a photo of a <attr> <obj>").
    pub both: Vec<u32>,
    /// Template mentioning only the object placeholder.
    pub object_only: Vec<u32>,
}

impl Templates {
    fn validate(&self, slots: lexi_core::PlaceholderSlots) -> Result<(), LexiError> {
        if !self.both.contains(&slots.attr) || !self.both.contains(&slots.obj) {
            return Err(LexiError::Config {
                message: "the joint template must mention both placeholder ids".to_string(),
            });
        }
        if !self.object_only.contains(&slots.obj) {
            return Err(LexiError::Config {
                message: "the object template must mention the object placeholder id"
                    .to_string(),
            });
        }
        if self.object_only.contains(&slots.attr) {
            return Err(LexiError::Config {
                message: "the object template must not mention the attribute placeholder"
                    .to_string(),
            });
        }
        Ok(())
    }
}

/// A validation snapshot taken every `validation_interval` steps.
///
/// Observational only: recording one never mutates training state.
#[derive(Debug, Clone)]
pub struct ValidationRecord {
    /// Global step at which the record was taken.
    pub step: usize,
    /// Cosine similarity between the explanation-subset embedding and
    /// the full composed object embedding.
    pub subset_alignment: f32,
    /// Candidate positions of the current top object weights, descending.
    pub top_object: Vec<u32>,
    /// Candidate positions of the current top attribute weights, descending.
    pub top_attr: Vec<u32>,
    /// Mean masked object weight over the whole candidate vocabulary.
    pub mean_object_weight: f32,
    /// Mean attribute weight over the attribute vocabulary.
    pub mean_attr_weight: f32,
}

/// Result of a completed training run.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    /// Optimizer steps completed (equals `max_train_steps` on a full run).
    pub steps_completed: usize,
    /// Mean loss of the final optimizer step.
    pub final_loss: f32,
    /// One mean loss per optimizer step.
    pub loss_history: Vec<f32>,
    /// Validation records, one per interval reached.
    pub validation: Vec<ValidationRecord>,
    /// Path of the written checkpoint.
    pub checkpoint: PathBuf,
}

/// Owns the optimization loop and the live embedding table.
///
/// The table is taken by value: exactly one writer exists per step and
/// cross-step access is serialized by the loop itself, so no locking is
/// needed or provided.
pub struct Trainer {
    config: TrainerConfig,
    device: Device,
    table: EmbeddingTable,
    composer: Composer,
    var_map: VarMap,
    net_attr: WeightNet,
    net_obj: WeightNet,
    vocab_matrix: Tensor,
    attr_matrix: Tensor,
    mask_tensor: Tensor,
    masked_out: usize,
    templates: Templates,
    rng: SimpleRng,
}

impl std::fmt::Debug for Trainer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Trainer")
            .field("net_attr", &self.net_attr)
            .field("net_obj", &self.net_obj)
            .field("table_rows", &self.table.rows())
            .field("masked_out", &self.masked_out)
            .finish()
    }
}

impl Trainer {
    /// Builds the trainer: validates the configuration against the fixed
    /// vocabularies, constructs both weighting networks on one `VarMap`
    /// (prefixes `attr.` / `obj.`), and caches the part-of-speech mask.
    ///
    /// Every trainable parameter is drawn from the run seed, so
    /// identically seeded runs start from identical networks and produce
    /// bit-identical checkpoints.
    ///
    /// The mask is computed once here: candidate identity is fixed after
    /// indexing, so re-tagging every step would only repeat the same
    /// answers.
    ///
    /// # Errors
    ///
    /// Returns [`LexiError::Config`] for any sizing or template mistake,
    /// [`LexiError::Internal`] on tensor failures.
    pub fn new(
        config: TrainerConfig,
        table: EmbeddingTable,
        object_vocab: &CandidateVocabulary,
        attr_vocab: &CandidateVocabulary,
        templates: Templates,
        tagger: &dyn PosTagger,
        device: &Device,
    ) -> Result<Self, LexiError> {
        let map_err = |e: candle_core::Error| LexiError::Internal {
            message: format!("Trainer new: {e}"),
        };

        config.validate(object_vocab, attr_vocab, &table)?;
        templates.validate(table.slots())?;

        let dim = table.dim();
        let var_map = VarMap::new();
        let vb = VarBuilder::from_varmap(&var_map, DType::F32, device);
        let net_attr = WeightNet::new(vb.pp("attr"), dim, config.hidden_dim)?;
        let net_obj = WeightNet::new(vb.pp("obj"), dim, config.hidden_dim)?;
        seed_parameters(&var_map, config.seed, device)?;

        let vocab_matrix = Tensor::from_slice(
            &object_vocab.embeddings,
            (object_vocab.len(), dim),
            device,
        )
        .map_err(map_err)?;
        let attr_matrix =
            Tensor::from_slice(&attr_vocab.embeddings, (attr_vocab.len(), dim), device)
                .map_err(map_err)?;

        let mask = noun_mask(&object_vocab.words, tagger);
        let masked_out = mask.iter().filter(|&&m| m == 0.0).count();
        let mask_tensor =
            Tensor::from_vec(mask, object_vocab.len(), device).map_err(map_err)?;

        let composer = Composer::new(table.mean_row_norm());
        let rng = SimpleRng::new(config.seed);

        info!(
            object_candidates = object_vocab.len(),
            attr_candidates = attr_vocab.len(),
            masked_out,
            target_norm = composer.target_norm(),
            params = net_attr.param_count() + net_obj.param_count(),
            "trainer initialized"
        );

        Ok(Self {
            config,
            device: device.clone(),
            table,
            composer,
            var_map,
            net_attr,
            net_obj,
            vocab_matrix,
            attr_matrix,
            mask_tensor,
            masked_out,
            templates,
            rng,
        })
    }

    /// Number of object candidates the mask zeroes out.
    pub fn masked_out(&self) -> usize {
        self.masked_out
    }

    /// Read access to the live table (placeholders hold the last
    /// composed values once training has run).
    pub fn table(&self) -> &EmbeddingTable {
        &self.table
    }

    /// Runs the optimization loop over the pixel batches, in loader
    /// order, cycling per epoch until the global step counter reaches
    /// `max_train_steps` (mid-epoch exit is expected) or the epoch
    /// budget runs out. Saves the checkpoint and returns the outcome.
    ///
    /// # Errors
    ///
    /// Propagates backend, tensor, and checkpoint failures.
    /// [`LexiError::ConsistencyViolation`] from the per-step table check
    /// is fatal and means the restore invariant was already broken.
    pub fn train<B: DiffusionBackend>(
        &mut self,
        backend: &B,
        batches: &[Tensor],
    ) -> Result<TrainOutcome, LexiError> {
        if batches.is_empty() {
            return Err(LexiError::Config {
                message: "no training batches provided".to_string(),
            });
        }
        if backend.num_timesteps() == 0 {
            return Err(LexiError::Config {
                message: "backend declares zero train timesteps".to_string(),
            });
        }

        let mut opt_attr = build_optimizer(
            &self.var_map,
            "attr.",
            self.config.learning_rate_attr,
            &self.config,
        )?;
        let mut opt_obj = build_optimizer(
            &self.var_map,
            "obj.",
            self.config.learning_rate_obj,
            &self.config,
        )?;
        let schedule = LrSchedule::new(
            self.config.lr_schedule,
            self.config.lr_warmup_steps,
            self.config.max_train_steps,
        );

        let accum = self.config.gradient_accumulation_steps.max(1);
        let mut micro: Vec<Tensor> = Vec::with_capacity(accum);
        let mut loss_history = Vec::with_capacity(self.config.max_train_steps);
        let mut validation = Vec::new();
        let mut global_step = 0usize;

        'training: for _epoch in 0..self.config.num_epochs {
            for (batch_idx, batch) in batches.iter().enumerate() {
                if micro.is_empty() {
                    // Invariant check at the step boundary: a divergent
                    // frozen row here means leakage escaped RESTORE.
                    self.table.verify_consistent()?;
                }

                let loss = self.forward_loss(backend, batch)?;
                micro.push(loss);

                let epoch_ends = batch_idx + 1 == batches.len();
                if micro.len() == accum || epoch_ends {
                    let scale = schedule.scale_at(global_step);
                    opt_attr.set_learning_rate(self.config.learning_rate_attr * scale);
                    opt_obj.set_learning_rate(self.config.learning_rate_obj * scale);

                    let step_loss =
                        optimize_step(&mut opt_attr, &mut opt_obj, &mut micro)?;
                    // RESTORE: the correctness-critical invariant.
                    self.table.restore();

                    global_step += 1;
                    loss_history.push(step_loss);

                    if self.config.validation_interval > 0
                        && global_step % self.config.validation_interval == 0
                    {
                        validation.push(self.validation_record(global_step)?);
                    }

                    if global_step >= self.config.max_train_steps {
                        break 'training;
                    }
                }
            }
        }

        let checkpoint =
            save_checkpoint(&self.var_map, &self.config, &self.config.output_dir)?;
        let final_loss = loss_history.last().copied().unwrap_or(f32::NAN);
        info!(steps = global_step, final_loss, "training complete");

        Ok(TrainOutcome {
            steps_completed: global_step,
            final_loss,
            loss_history,
            validation,
            checkpoint,
        })
    }

    /// COMPOSE + FORWARD for one micro-batch, returning the loss tensor
    /// still attached to the graph.
    fn forward_loss<B: DiffusionBackend>(
        &mut self,
        backend: &B,
        batch: &Tensor,
    ) -> Result<Tensor, LexiError> {
        let map_err = |e: candle_core::Error| LexiError::Internal {
            message: format!("forward_loss: {e}"),
        };

        // COMPOSE, object path: gate, mask, full-weight composition.
        let alphas_obj = self.net_obj.forward(&self.vocab_matrix)?;
        let masked_obj = (&alphas_obj * &self.mask_tensor).map_err(map_err)?;
        let masked_host = masked_obj.to_vec1::<f32>().map_err(map_err)?;
        let explain_idx = top_k_indices(&masked_host, self.config.explanation_tokens)?;
        let embedding_obj = self.composer.compose(&masked_obj, &self.vocab_matrix)?;

        // COMPOSE, attribute path: gate, top-M subset composition.
        let alphas_attr = self.net_attr.forward(&self.attr_matrix)?;
        let attr_host = alphas_attr.to_vec1::<f32>().map_err(map_err)?;
        let attr_idx = top_k_indices(&attr_host, self.config.attr_take)?;
        let attr_idx_t =
            Tensor::from_vec(attr_idx, self.config.attr_take, &self.device)
                .map_err(map_err)?;
        let attr_weights = alphas_attr.index_select(&attr_idx_t, 0).map_err(map_err)?;
        let attr_rows = self.attr_matrix.index_select(&attr_idx_t, 0).map_err(map_err)?;
        let embedding_attr = self.composer.compose(&attr_weights, &attr_rows)?;

        // Write both composed embeddings into the live placeholder rows.
        self.table
            .write(Slot::Attr, &embedding_attr.to_vec1::<f32>().map_err(map_err)?)?;
        self.table
            .write(Slot::Obj, &embedding_obj.to_vec1::<f32>().map_err(map_err)?)?;

        // FORWARD. Latents carry no gradient; noise and timesteps are
        // drawn from the seeded PRNG so runs are reproducible.
        let latents = backend.encode(batch)?;
        let batch_size = latents.dims().first().copied().unwrap_or(1);
        let timesteps: Vec<usize> = (0..batch_size)
            .map(|_| self.rng.next_range(backend.num_timesteps()))
            .collect();
        let noise_data = self.rng.normal_vec(latents.elem_count());
        let noise =
            Tensor::from_vec(noise_data, latents.dims(), &self.device).map_err(map_err)?;
        let noisy = backend.add_noise(&latents, &noise, &timesteps)?;

        let cond_both = backend.encode_text(&Conditioning {
            token_ids: &self.templates.both,
            table: &self.table,
            attr: &embedding_attr,
            obj: &embedding_obj,
        })?;
        let cond_obj = backend.encode_text(&Conditioning {
            token_ids: &self.templates.object_only,
            table: &self.table,
            attr: &embedding_attr,
            obj: &embedding_obj,
        })?;

        let pred_both = backend.predict_noise(&noisy, &timesteps, &cond_both)?;
        let pred_obj = backend.predict_noise(&noisy, &timesteps, &cond_obj)?;

        let target = match backend.prediction_kind() {
            PredictionKind::Epsilon => noise,
            PredictionKind::Velocity => backend.velocity(&latents, &noise, &timesteps)?,
        };

        let mse_both = mse(&pred_both, &target)?;
        let mse_obj = mse(&pred_obj, &target)?;

        // Explanation-subset consistency: the top-K masked weights alone
        // should already point where the full composition points.
        let explain_idx_t = Tensor::from_vec(
            explain_idx,
            self.config.explanation_tokens,
            &self.device,
        )
        .map_err(map_err)?;
        let top_weights = masked_obj.index_select(&explain_idx_t, 0).map_err(map_err)?;
        let top_rows = self
            .vocab_matrix
            .index_select(&explain_idx_t, 0)
            .map_err(map_err)?;
        let subset_embedding = self.composer.compose_raw(&top_weights, &top_rows)?;
        let cos = cosine_similarity(&subset_embedding, &embedding_obj)?;
        let penalty = cos
            .affine(-self.config.consistency_weight, self.config.consistency_weight)
            .map_err(map_err)?; // λ·(1 − cos)

        let sum = (&mse_both + &mse_obj).map_err(map_err)?;
        (&sum + &penalty).map_err(map_err)
    }

    /// Observational validation snapshot; never mutates training state.
    fn validation_record(&self, step: usize) -> Result<ValidationRecord, LexiError> {
        let map_err = |e: candle_core::Error| LexiError::Internal {
            message: format!("validation_record: {e}"),
        };

        let alphas_obj = self.net_obj.forward(&self.vocab_matrix)?;
        let masked_obj = (&alphas_obj * &self.mask_tensor).map_err(map_err)?;
        let masked_host = masked_obj.to_vec1::<f32>().map_err(map_err)?;
        let top_object = top_k_indices(&masked_host, self.config.explanation_tokens)?;

        let embedding_obj = self.composer.compose(&masked_obj, &self.vocab_matrix)?;
        let idx_t = Tensor::from_vec(
            top_object.clone(),
            self.config.explanation_tokens,
            &self.device,
        )
        .map_err(map_err)?;
        let top_weights = masked_obj.index_select(&idx_t, 0).map_err(map_err)?;
        let top_rows = self.vocab_matrix.index_select(&idx_t, 0).map_err(map_err)?;
        let subset = self.composer.compose_raw(&top_weights, &top_rows)?;
        let subset_alignment = cosine_similarity(&subset, &embedding_obj)?
            .to_vec0::<f32>()
            .map_err(map_err)?;

        let alphas_attr = self.net_attr.forward(&self.attr_matrix)?;
        let attr_host = alphas_attr.to_vec1::<f32>().map_err(map_err)?;
        let top_attr = top_k_indices(&attr_host, self.config.attr_take)?;

        let mean_object_weight =
            masked_host.iter().sum::<f32>() / masked_host.len() as f32;
        let mean_attr_weight = attr_host.iter().sum::<f32>() / attr_host.len() as f32;

        debug!(step, subset_alignment, "validation record");
        Ok(ValidationRecord {
            step,
            subset_alignment,
            top_object,
            top_attr,
            mean_object_weight,
            mean_attr_weight,
        })
    }
}

impl TrainerConfig {
    /// Checks the configuration against the fixed vocabularies and the
    /// table geometry. Every rejection is [`LexiError::Config`] and
    /// fatal before any training step.
    pub fn validate(
        &self,
        object_vocab: &CandidateVocabulary,
        attr_vocab: &CandidateVocabulary,
        table: &EmbeddingTable,
    ) -> Result<(), LexiError> {
        if object_vocab.is_empty() || attr_vocab.is_empty() {
            return Err(LexiError::Config {
                message: "candidate vocabularies must be nonempty".to_string(),
            });
        }
        if self.vocabulary_size != object_vocab.len() {
            return Err(LexiError::Config {
                message: format!(
                    "configured vocabulary size {} does not match the {} indexed object candidates",
                    self.vocabulary_size,
                    object_vocab.len()
                ),
            });
        }
        if self.explanation_tokens > object_vocab.len() {
            return Err(LexiError::Config {
                message: format!(
                    "explanation subset {} exceeds object vocabulary {}",
                    self.explanation_tokens,
                    object_vocab.len()
                ),
            });
        }
        if self.attr_take > attr_vocab.len() {
            return Err(LexiError::Config {
                message: format!(
                    "attribute subset {} exceeds attribute vocabulary {}",
                    self.attr_take,
                    attr_vocab.len()
                ),
            });
        }
        if object_vocab.dim != table.dim() || attr_vocab.dim != table.dim() {
            return Err(LexiError::Config {
                message: "vocabulary embedding dim must match the table".to_string(),
            });
        }
        if self.max_train_steps == 0 {
            return Err(LexiError::Config {
                message: "max_train_steps must be positive".to_string(),
            });
        }
        if self.num_epochs == 0 || self.train_batch_size == 0 {
            return Err(LexiError::Config {
                message: "epochs and batch size must be positive".to_string(),
            });
        }
        Ok(())
    }
}

/// Overwrites every trainable parameter with values drawn from the run
/// seed: uniform in `±1/sqrt(fan_in)`, in name-sorted order. Replaces
/// the tensor library's unseeded layer initializer so identically
/// seeded runs start bit-identical.
fn seed_parameters(
    var_map: &VarMap,
    seed: u64,
    device: &Device,
) -> Result<(), LexiError> {
    let map_err = |e: candle_core::Error| LexiError::Internal {
        message: format!("seed_parameters: {e}"),
    };
    let data = var_map.data().lock().map_err(|_| LexiError::Internal {
        message: "variable store mutex poisoned".to_string(),
    })?;
    let mut named: Vec<(&String, &Var)> = data.iter().collect();
    named.sort_by(|a, b| a.0.cmp(b.0));

    let mut rng = SimpleRng::new(seed);
    for (_, var) in named {
        let dims = var.dims().to_vec();
        let fan_in = dims.last().copied().unwrap_or(1).max(1);
        let bound = (1.0 / fan_in as f32).sqrt();
        let count: usize = dims.iter().product();
        let values: Vec<f32> = (0..count)
            .map(|_| (rng.next_f32() * 2.0 - 1.0) * bound)
            .collect();
        let init = Tensor::from_vec(values, dims, device).map_err(map_err)?;
        var.set(&init).map_err(map_err)?;
    }
    Ok(())
}

/// Collects the `VarMap` entries under one prefix, name-sorted so
/// optimizer state ordering is deterministic.
fn vars_with_prefix(var_map: &VarMap, prefix: &str) -> Result<Vec<Var>, LexiError> {
    let data = var_map.data().lock().map_err(|_| LexiError::Internal {
        message: "variable store mutex poisoned".to_string(),
    })?;
    let mut named: Vec<(String, Var)> = data
        .iter()
        .filter(|(name, _)| name.starts_with(prefix))
        .map(|(name, var)| (name.clone(), var.clone()))
        .collect();
    named.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(named.into_iter().map(|(_, var)| var).collect())
}

fn build_optimizer(
    var_map: &VarMap,
    prefix: &str,
    lr: f64,
    config: &TrainerConfig,
) -> Result<AdamW, LexiError> {
    let vars = vars_with_prefix(var_map, prefix)?;
    AdamW::new(
        vars,
        ParamsAdamW {
            lr,
            beta1: config.adam_beta1,
            beta2: config.adam_beta2,
            eps: config.adam_epsilon,
            weight_decay: config.adam_weight_decay,
        },
    )
    .map_err(|e| LexiError::Internal {
        message: format!("build_optimizer {prefix}: {e}"),
    })
}

/// Backward over the accumulated micro-batch losses, one step per
/// optimizer. A single gradient store serves both: each optimizer only
/// applies the gradients of its own variables.
fn optimize_step(
    opt_attr: &mut AdamW,
    opt_obj: &mut AdamW,
    micro: &mut Vec<Tensor>,
) -> Result<f32, LexiError> {
    let map_err = |e: candle_core::Error| LexiError::Internal {
        message: format!("optimize_step: {e}"),
    };

    let stacked = Tensor::stack(micro.as_slice(), 0).map_err(map_err)?;
    micro.clear();
    let loss = stacked.mean_all().map_err(map_err)?;
    let grads = loss.backward().map_err(map_err)?;
    opt_attr.step(&grads).map_err(map_err)?;
    opt_obj.step(&grads).map_err(map_err)?;
    loss.to_vec0::<f32>().map_err(map_err)
}

fn mse(a: &Tensor, b: &Tensor) -> Result<Tensor, LexiError> {
    let map_err = |e: candle_core::Error| LexiError::Internal {
        message: format!("mse: {e}"),
    };
    (a - b)
        .map_err(map_err)?
        .sqr()
        .map_err(map_err)?
        .mean_all()
        .map_err(map_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexi_core::PlaceholderSlots;

    fn vocab(n: usize, dim: usize, word: &str) -> CandidateVocabulary {
        CandidateVocabulary {
            indices: (0..n as u32).collect(),
            words: (0..n).map(|i| format!("{word}{i}")).collect(),
            embeddings: (0..n * dim).map(|i| (i as f32 * 0.01).sin()).collect(),
            dim,
        }
    }

    #[test]
    fn config_rejects_oversized_subsets() {
        let table = EmbeddingTable::new(
            vec![0.5; 10 * 4],
            4,
            PlaceholderSlots { attr: 8, obj: 9 },
        )
        .unwrap();
        let mut config = TrainerConfig {
            vocabulary_size: 5,
            explanation_tokens: 50,
            ..TrainerConfig::default()
        };
        let obj = vocab(5, 4, "w");
        let attr = vocab(3, 4, "a");
        assert!(config.validate(&obj, &attr, &table).is_err());

        config.explanation_tokens = 3;
        config.attr_take = 9;
        assert!(config.validate(&obj, &attr, &table).is_err());

        config.attr_take = 2;
        assert!(config.validate(&obj, &attr, &table).is_ok());
    }

    #[test]
    fn config_rejects_vocabulary_size_mismatch() {
        let table = EmbeddingTable::new(
            vec![0.5; 10 * 4],
            4,
            PlaceholderSlots { attr: 8, obj: 9 },
        )
        .unwrap();
        let config = TrainerConfig {
            vocabulary_size: 500,
            explanation_tokens: 3,
            attr_take: 2,
            ..TrainerConfig::default()
        };
        let obj = vocab(5, 4, "w");
        let attr = vocab(3, 4, "a");
        assert!(matches!(
            config.validate(&obj, &attr, &table),
            Err(LexiError::Config { .. })
        ));
    }

    #[test]
    fn templates_must_mention_their_placeholders() {
        let slots = PlaceholderSlots { attr: 8, obj: 9 };
        let good = Templates {
            both: vec![0, 8, 9],
            object_only: vec![0, 9],
        };
        assert!(good.validate(slots).is_ok());

        let missing_attr = Templates {
            both: vec![0, 9],
            object_only: vec![0, 9],
        };
        assert!(missing_attr.validate(slots).is_err());

        let attr_in_obj = Templates {
            both: vec![8, 9],
            object_only: vec![8, 9],
        };
        assert!(attr_in_obj.validate(slots).is_err());
    }

    #[test]
    fn default_config_sensible() {
        let config = TrainerConfig::default();
        assert_eq!(config.vocabulary_size, 500);
        assert_eq!(config.explanation_tokens, 50);
        assert_eq!(config.attr_take, 10);
        assert_eq!(config.max_train_steps, 30);
        assert!(config.learning_rate_attr > config.learning_rate_obj);
        assert!(config.consistency_weight > 0.0);
    }
}
