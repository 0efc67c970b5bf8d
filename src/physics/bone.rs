//! 动态骨骼组件
//!
//! 一个配置可以指定多个根节点，每个根生成一条链，作为一组注册到调度器。

use std::collections::HashSet;

use crate::skeleton::SceneGraph;

use super::chain::{Chain, ChainBuilder, ChainId};
use super::config::ChainConfig;

/// 多根动态骨骼组件
#[derive(Debug, Clone)]
pub struct JiggleBone {
    config: ChainConfig,
    chains: Vec<Chain>,
}

impl JiggleBone {
    /// 为每个根节点构建链
    ///
    /// 重复的根、无效的根与超出容量的链会被跳过并记录警告，不影响其余链。
    pub fn build<S: SceneGraph + ?Sized>(scene: &S, config: &ChainConfig) -> Self {
        let config = config.sanitized();
        let builder = ChainBuilder::new(scene, &config.end_nodes);

        let mut seen = HashSet::new();
        let mut chains = Vec::with_capacity(config.roots.len());
        for &root in &config.roots {
            if !seen.insert(root) {
                log::warn!("[Jiggle] 根节点 {:?} 重复，跳过", root);
                continue;
            }
            match builder.build(root) {
                Ok(mut chain) => {
                    chain.apply_config(&config);
                    chains.push(chain);
                }
                Err(e) => log::warn!("[Jiggle] 链构建失败，跳过: {}", e),
            }
        }

        log::info!(
            "[Jiggle] 组件构建完成: {}/{} 条链, 质点 {}",
            chains.len(),
            config.roots.len(),
            chains.iter().map(|c| c.particle_count()).sum::<usize>()
        );

        Self { config, chains }
    }

    pub fn config(&self) -> &ChainConfig {
        &self.config
    }

    pub fn chains(&self) -> &[Chain] {
        &self.chains
    }

    pub fn chain_ids(&self) -> Vec<ChainId> {
        self.chains.iter().map(|c| c.id()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }
}
