//! The pipelines behind each CLI command.

use std::sync::Arc;

use crate::build::{MemoryCache, Registry, cache, compose, logging};
use crate::config::BuildSettings;
use crate::infra::Executor;

use super::engine::EventPipeline;
use super::stages::{
  Approval, BuildStacks, GenerateStubs, ScanStacks, SelectStack, TerraformApply, TerraformDestroy, TerraformInit,
  TerraformOutputs, TerraformPlan,
};

/// The default registry wrapped per `settings`: always logged, cached
/// unless disabled.
pub fn registry_for(settings: &BuildSettings) -> Registry {
  let decorator = if settings.cache {
    compose(vec![logging(), cache(Arc::new(MemoryCache::new()))])
  } else {
    logging()
  };
  Registry::new().decorate(&decorator)
}

/// Collaborators shared by the command pipelines.
#[derive(Clone)]
pub struct Conventions {
  pub registry: Arc<Registry>,
  pub executor: Arc<dyn Executor>,
  pub parallelism: usize,
}

impl Conventions {
  pub fn new(registry: Arc<Registry>, executor: Arc<dyn Executor>) -> Self {
    Self {
      registry,
      executor,
      parallelism: 1,
    }
  }

  pub fn with_parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism.max(1);
    self
  }

  fn build_stage(&self) -> BuildStacks {
    BuildStacks::new(self.registry.clone()).with_parallelism(self.parallelism)
  }

  /// scan → build
  pub fn build(&self) -> EventPipeline {
    EventPipeline::default().then(ScanStacks).then(self.build_stage())
  }

  /// scan → stubs, for `build --stub-only`
  pub fn stubs(&self) -> EventPipeline {
    EventPipeline::default().then(ScanStacks).then(GenerateStubs)
  }

  /// scan → stubs → init → plan
  pub fn plan(&self, namespace: Option<String>) -> EventPipeline {
    EventPipeline::default()
      .then(ScanStacks)
      .then(GenerateStubs)
      .then(TerraformInit::new(self.executor.clone()))
      .then(TerraformPlan::new(self.executor.clone(), namespace))
  }

  /// scan → stubs → build → init → plan → apply → outputs
  pub fn deploy(&self, namespace: Option<String>, approval: Approval) -> EventPipeline {
    EventPipeline::default()
      .then(ScanStacks)
      .then(GenerateStubs)
      .then(self.build_stage())
      .then(TerraformInit::new(self.executor.clone()))
      .then(TerraformPlan::new(self.executor.clone(), namespace.clone()))
      .then(TerraformApply::new(self.executor.clone(), namespace, approval))
      .then(TerraformOutputs::new(self.executor.clone()))
  }

  /// scan → init → destroy
  pub fn destroy(&self, namespace: Option<String>, approval: Approval) -> EventPipeline {
    EventPipeline::default()
      .then(ScanStacks)
      .then(TerraformInit::new(self.executor.clone()))
      .then(TerraformDestroy::new(self.executor.clone(), namespace, approval))
  }

  /// scan → select → init → destroy, for a single named stack.
  ///
  /// Stacks depending on the target are left alone.
  pub fn destroy_stack(&self, stack: impl Into<String>, namespace: Option<String>, approval: Approval) -> EventPipeline {
    EventPipeline::default()
      .then(ScanStacks)
      .then(SelectStack::new(stack))
      .then(TerraformInit::new(self.executor.clone()))
      .then(TerraformDestroy::new(self.executor.clone(), namespace, approval))
  }
}
