//! 批量调度器
//!
//! 所有链打包进两块连续缓冲区：
//! - heads: 每条链一项头部状态
//! - particles: 每条链固定占用 MAX_PARTICLE_COUNT 个槽位，偏移 = 链索引 × 容量
//!
//! 每帧流水线按阶段执行，每个阶段是一次 rayon 并行调用，调用结束即屏障。
//! 链之间互不依赖；链内的阶段 3/5 按索引顺序执行（父索引总小于子索引）。
//! 移除采用 swap-back：帧开始时把最后一条链拷贝到被移除的位置再截断。

use std::collections::HashMap;

use glam::Vec3;
use rayon::prelude::*;

use crate::skeleton::SceneGraph;
use crate::{JiggleError, Result};

use super::bone::JiggleBone;
use super::chain::{Chain, ChainFlags, ChainId, HeadState};
use super::collider::{ColliderHandle, FrameContext};
use super::config::{clamp01, get_config, ChainConfig};
use super::integrator;
use super::particle::{Particle, MAX_PARTICLE_COUNT};
use super::scene_sync;

/// 批量调度器
///
/// 由宿主显式创建并持有，注册/注销链并每帧调用 tick。
pub struct BatchScheduler {
    heads: Vec<HeadState>,
    /// 长度恒为 heads.len() * MAX_PARTICLE_COUNT
    particles: Vec<Particle>,
    /// 每条链的碰撞体，与 heads 同序
    colliders: Vec<Vec<ColliderHandle>>,
    index_of: HashMap<ChainId, usize>,
    pending_removals: usize,
    frame: u64,
}

impl Default for BatchScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl BatchScheduler {
    pub fn new() -> Self {
        let capacity = get_config().initial_chain_capacity;
        Self {
            heads: Vec::with_capacity(capacity),
            particles: Vec::with_capacity(capacity * MAX_PARTICLE_COUNT),
            colliders: Vec::with_capacity(capacity),
            index_of: HashMap::with_capacity(capacity),
            pending_removals: 0,
            frame: 0,
        }
    }

    // ========================================================================
    // 注册 / 注销
    // ========================================================================

    /// 注册链：拷贝头部与质点到共享缓冲区
    ///
    /// 质点数超出单链容量时拒绝注册。已注册的链不重复添加；
    /// 等待移除的链会被恢复并刷新数据。
    pub fn add_chain(&mut self, chain: &Chain) -> Result<ChainId> {
        let id = chain.id();
        let count = chain.particles.len();
        if count > MAX_PARTICLE_COUNT {
            let err = JiggleError::CapacityExceeded {
                root: chain.root(),
                count,
                capacity: MAX_PARTICLE_COUNT,
            };
            log::warn!("[Jiggle] 链 {:?} 注册失败: {}", id, err);
            return Err(err);
        }

        if let Some(&index) = self.index_of.get(&id) {
            if self.heads[index].flags.contains(ChainFlags::REMOVE_PENDING) {
                let offset = index * MAX_PARTICLE_COUNT;
                self.heads[index] = Self::registered_head(chain, offset, count);
                self.particles[offset..offset + count].copy_from_slice(&chain.particles);
                self.colliders[index] = chain.colliders.clone();
                self.pending_removals -= 1;
            } else {
                log::warn!("[Jiggle] {}，忽略", JiggleError::DuplicateChain(id));
            }
            return Ok(id);
        }

        let index = self.heads.len();
        let offset = index * MAX_PARTICLE_COUNT;
        self.heads.push(Self::registered_head(chain, offset, count));
        self.particles.extend_from_slice(&chain.particles);
        self.particles.resize(offset + MAX_PARTICLE_COUNT, Particle::default());
        self.colliders.push(chain.colliders.clone());
        self.index_of.insert(id, index);

        if get_config().debug_log {
            log::debug!("[Jiggle] 注册链 {:?}: 质点 {}, 偏移 {}", id, count, offset);
        }
        Ok(id)
    }

    fn registered_head(chain: &Chain, offset: usize, count: usize) -> HeadState {
        let mut head = chain.head;
        head.offset = offset;
        head.particle_count = count;
        head.flags = ChainFlags::empty();
        head
    }

    /// 注册多根组件的全部链，返回成功注册的链
    pub fn add_bone(&mut self, bone: &JiggleBone) -> Vec<ChainId> {
        let ids: Vec<ChainId> = bone
            .chains()
            .iter()
            .filter_map(|c| self.add_chain(c).ok())
            .collect();
        log::info!("[Jiggle] 注册组件: {} 条链, 当前共 {} 条", ids.len(), self.heads.len());
        ids
    }

    /// 标记移除，实际移除在下一次 tick 开始时进行
    ///
    /// 未注册或已在等待移除时返回 false。
    pub fn remove_chain(&mut self, id: ChainId) -> bool {
        let Some(&index) = self.index_of.get(&id) else {
            return false;
        };
        let head = &mut self.heads[index];
        if head.flags.contains(ChainFlags::REMOVE_PENDING) {
            return false;
        }
        head.flags.insert(ChainFlags::REMOVE_PENDING);
        self.pending_removals += 1;
        true
    }

    /// 注销组件的全部链，返回实际标记的数量
    pub fn remove_bone(&mut self, bone: &JiggleBone) -> usize {
        bone.chains()
            .iter()
            .filter(|c| self.remove_chain(c.id()))
            .count()
    }

    /// 设置混合权重
    ///
    /// 变为 0 时下一帧写回静止姿态；从 0 恢复时下一帧质点对齐动画姿态。
    pub fn set_weight(&mut self, id: ChainId, weight: f32) -> Result<()> {
        let index = self.index(id)?;
        let epsilon = get_config().weight_epsilon;
        let head = &mut self.heads[index];

        let weight = clamp01(weight);
        let old = head.weight;
        if (weight - old).abs() < epsilon && (weight > 0.0) == (old > 0.0) {
            return Ok(());
        }

        if weight <= 0.0 && old > 0.0 {
            head.flags.insert(ChainFlags::RESTORE_PENDING);
            head.flags.remove(ChainFlags::RESET_PENDING);
        } else if weight > 0.0 && old <= 0.0 {
            head.flags.insert(ChainFlags::RESET_PENDING);
            head.flags.remove(ChainFlags::RESTORE_PENDING);
        }
        head.weight = weight;
        Ok(())
    }

    /// 运行时更新参数：重新映射质点参数、重力、外力、碰撞体与权重
    pub fn update_parameters(&mut self, id: ChainId, config: &ChainConfig) -> Result<()> {
        let index = self.index(id)?;
        let config = config.sanitized();
        let range = self.chain_range(index);

        let weight = self.heads[index].weight;
        let mut chain = Chain {
            head: self.heads[index],
            particles: self.particles[range.clone()].to_vec(),
            colliders: Vec::new(),
        };
        chain.apply_config(&config);
        chain.head.weight = weight;

        self.heads[index] = chain.head;
        self.particles[range].copy_from_slice(&chain.particles);
        self.colliders[index] = chain.colliders;

        self.set_weight(id, config.blend_weight)
    }

    /// 把所有参与模拟的链节点恢复到静止本地姿态
    ///
    /// 宿主需要在播放动画前清除场景里的物理结果时调用。
    pub fn restore_rest_pose<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) {
        for (head, chunk) in self
            .heads
            .iter()
            .zip(self.particles.chunks_mut(MAX_PARTICLE_COUNT))
        {
            if head.is_active() {
                scene_sync::restore_rest_pose(scene, &mut chunk[..head.particle_count]);
            }
        }
    }

    /// 释放所有缓冲区
    pub fn clear(&mut self) {
        self.heads = Vec::new();
        self.particles = Vec::new();
        self.colliders = Vec::new();
        self.index_of = HashMap::new();
        self.pending_removals = 0;
    }

    // ========================================================================
    // 查询
    // ========================================================================

    /// 已注册的链数量（包含等待移除的链）
    pub fn chain_count(&self) -> usize {
        self.heads.len()
    }

    /// 有效质点总数（不含填充槽位）
    pub fn particle_count(&self) -> usize {
        self.heads.iter().map(|h| h.particle_count).sum()
    }

    pub fn contains(&self, id: ChainId) -> bool {
        self.index_of.contains_key(&id)
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn head(&self, id: ChainId) -> Option<&HeadState> {
        self.index_of.get(&id).map(|&i| &self.heads[i])
    }

    /// 链的有效质点切片
    pub fn chain_particles(&self, id: ChainId) -> Option<&[Particle]> {
        let &index = self.index_of.get(&id)?;
        Some(&self.particles[self.chain_range(index)])
    }

    fn index(&self, id: ChainId) -> Result<usize> {
        self.index_of
            .get(&id)
            .copied()
            .ok_or(JiggleError::UnknownChain(id))
    }

    fn chain_range(&self, index: usize) -> std::ops::Range<usize> {
        let head = &self.heads[index];
        head.offset..head.offset + head.particle_count
    }

    // ========================================================================
    // 每帧流水线
    // ========================================================================

    /// 执行一帧
    ///
    /// 本地姿态仍是上一帧写回结果的节点按静止姿态参与计算，
    /// 因此宿主不必在每帧前调用 restore_rest_pose。
    /// delta_time <= 0 时只做移除与静止姿态写回，不推进模拟。
    pub fn tick<S>(&mut self, scene: &mut S, delta_time: f32)
    where
        S: SceneGraph + Sync + ?Sized,
    {
        self.frame += 1;
        let ctx = FrameContext::new(self.frame);

        self.compact();
        self.apply_pending_restores(scene);

        if !(delta_time > 0.0) || self.heads.is_empty() {
            return;
        }

        // 阶段 1：读取头部运动学与动画本地姿态
        let scene_ref: &S = scene;
        self.heads
            .par_iter_mut()
            .zip(self.particles.par_chunks_mut(MAX_PARTICLE_COUNT))
            .filter(|(head, _)| head.is_active())
            .for_each(|(head, chunk)| {
                scene_sync::read_head(scene_ref, head, &chunk[0]);
                scene_sync::read_local_poses(scene_ref, &mut chunk[..head.particle_count]);
            });

        // 阶段 2：头部受力与碰撞体准备（共享碰撞体每帧只计算一次）
        self.heads
            .par_iter_mut()
            .zip(self.colliders.par_iter())
            .filter(|(head, _)| head.is_active())
            .for_each(|(head, colliders)| {
                if head.flags.contains(ChainFlags::RESET_PENDING) {
                    head.prev_position = head.position;
                }
                integrator::prepare_head(head, delta_time);
                for collider in colliders.iter().filter(|c| c.is_enabled()) {
                    collider.prepare(&ctx, scene_ref);
                }
            });

        // 阶段 3：理想姿态
        self.heads
            .par_iter_mut()
            .zip(self.particles.par_chunks_mut(MAX_PARTICLE_COUNT))
            .filter(|(head, _)| head.is_active())
            .for_each(|(head, chunk)| {
                let particles = &mut chunk[..head.particle_count];
                integrator::compute_ideal_pose(head, particles);
                if head.flags.contains(ChainFlags::RESET_PENDING) {
                    particles.iter_mut().for_each(Particle::snap_to_ideal);
                    head.displacement = Vec3::ZERO;
                    head.flags.remove(ChainFlags::RESET_PENDING);
                }
            });

        // 阶段 4：逐质点推进
        let heads = &self.heads;
        self.particles
            .par_iter_mut()
            .enumerate()
            .for_each(|(slot, p)| {
                let head = &heads[slot / MAX_PARTICLE_COUNT];
                if slot % MAX_PARTICLE_COUNT < head.particle_count && head.is_active() {
                    integrator::advance_particle(head, p);
                }
            });

        // 阶段 5：约束投影
        self.heads
            .par_iter()
            .zip(self.particles.par_chunks_mut(MAX_PARTICLE_COUNT))
            .zip(self.colliders.par_iter())
            .filter(|((head, _), _)| head.is_active())
            .for_each(|((head, chunk), colliders)| {
                integrator::project_constraints(head, &mut chunk[..head.particle_count], colliders);
            });

        // 阶段 6：计算写回旋转，然后单线程写回场景
        self.heads
            .par_iter()
            .zip(self.particles.par_chunks_mut(MAX_PARTICLE_COUNT))
            .filter(|(head, _)| head.is_active())
            .for_each(|(head, chunk)| {
                integrator::resolve_rotations(&mut chunk[..head.particle_count]);
            });

        for (head, chunk) in self
            .heads
            .iter()
            .zip(self.particles.chunks_mut(MAX_PARTICLE_COUNT))
        {
            if head.is_active() {
                scene_sync::write_back(scene, &mut chunk[..head.particle_count]);
            }
        }
    }

    /// 权重变为 0 的链写回静止姿态
    fn apply_pending_restores<S: SceneGraph + ?Sized>(&mut self, scene: &mut S) {
        for (head, chunk) in self
            .heads
            .iter_mut()
            .zip(self.particles.chunks_mut(MAX_PARTICLE_COUNT))
        {
            if head.flags.contains(ChainFlags::RESTORE_PENDING) {
                scene_sync::restore_rest_pose(scene, &mut chunk[..head.particle_count]);
                head.flags.remove(ChainFlags::RESTORE_PENDING);
            }
        }
    }

    /// swap-back 移除所有等待移除的链
    fn compact(&mut self) {
        if self.pending_removals == 0 {
            return;
        }

        let before = self.heads.len();
        let mut i = 0;
        while i < self.heads.len() {
            if self.heads[i].flags.contains(ChainFlags::REMOVE_PENDING) {
                // 换入的链落在 i 上，需要再次检查
                self.swap_remove(i);
            } else {
                i += 1;
            }
        }
        self.pending_removals = 0;

        if get_config().debug_log {
            log::debug!("[Jiggle] 移除 {} 条链, 剩余 {}", before - self.heads.len(), self.heads.len());
        }
    }

    fn swap_remove(&mut self, index: usize) {
        let last = self.heads.len() - 1;
        self.index_of.remove(&self.heads[index].chain_id);

        if index != last {
            let src = last * MAX_PARTICLE_COUNT;
            self.particles
                .copy_within(src..src + MAX_PARTICLE_COUNT, index * MAX_PARTICLE_COUNT);
        }
        self.heads.swap_remove(index);
        self.colliders.swap_remove(index);
        self.particles.truncate(last * MAX_PARTICLE_COUNT);

        // 刷新换入链的偏移
        if index < self.heads.len() {
            let head = &mut self.heads[index];
            head.offset = index * MAX_PARTICLE_COUNT;
            self.index_of.insert(head.chain_id, index);
        }
    }
}
