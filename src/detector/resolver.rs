//! 关联关系解析：implies 推导到不动点，然后统一应用 excludes

use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, error, warn};

use super::candidate::CandidateState;
use crate::compiler::CompiledRuleLibrary;
use crate::error::{RswResult, RswappalyzerError};
use crate::utils::DetectionUpdater;

/// 候选技术表（顺序存储 + 名称索引）
#[derive(Debug, Default)]
pub struct CandidateTable {
    candidates: Vec<CandidateState>,
    index: HashMap<String, usize>,
}

impl CandidateTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// 插入候选，同名已存在时返回已有下标
    pub fn insert(&mut self, candidate: CandidateState) -> usize {
        if let Some(&idx) = self.index.get(candidate.name()) {
            return idx;
        }
        let idx = self.candidates.len();
        self.index.insert(candidate.name().to_string(), idx);
        self.candidates.push(candidate);
        idx
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn get(&self, name: &str) -> Option<&CandidateState> {
        self.index_of(name).map(|idx| &self.candidates[idx])
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut CandidateState> {
        let idx = self.index_of(name)?;
        self.candidates.get_mut(idx)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CandidateState> {
        self.candidates.iter()
    }

    /// 按条件保留候选，并重建索引
    pub fn retain(&mut self, keep: impl FnMut(&CandidateState) -> bool) {
        self.candidates.retain(keep);
        self.index = self
            .candidates
            .iter()
            .enumerate()
            .map(|(idx, candidate)| (candidate.name().to_string(), idx))
            .collect();
    }

    pub fn into_map(self) -> BTreeMap<String, CandidateState> {
        self.candidates
            .into_iter()
            .map(|candidate| (candidate.name().to_string(), candidate))
            .collect()
    }

    /// 同时取得来源（只读）与目标（可变）两个不同下标的候选
    fn pair_mut(&mut self, source: usize, target: usize) -> (&CandidateState, &mut CandidateState) {
        if source < target {
            let (head, tail) = self.candidates.split_at_mut(target);
            (&head[source], &mut tail[0])
        } else {
            let (head, tail) = self.candidates.split_at_mut(source);
            (&tail[0], &mut head[target])
        }
    }
}

impl FromIterator<CandidateState> for CandidateTable {
    fn from_iter<I: IntoIterator<Item = CandidateState>>(iter: I) -> Self {
        let mut table = Self::new();
        for candidate in iter {
            table.insert(candidate);
        }
        table
    }
}

/// 关联关系解析器
pub struct RelationResolver<'a> {
    compiled_lib: &'a CompiledRuleLibrary,
    max_passes: usize,
}

impl<'a> RelationResolver<'a> {
    pub fn new(compiled_lib: &'a CompiledRuleLibrary, max_passes: usize) -> Self {
        Self {
            compiled_lib,
            max_passes: max_passes.max(1),
        }
    }

    /// implies 推导后应用 excludes
    /// implies 出错时保留已推导的部分，excludes 照常执行，错误随后返回
    pub fn resolve(&self, table: &mut CandidateTable) -> RswResult<()> {
        let implies_result = self.resolve_implies(table);
        if let Err(err) = &implies_result {
            error!("implies 推导中止：{}", err);
        }
        let removed = self.resolve_excludes(table);
        if !removed.is_empty() {
            debug!("excludes 移除技术：{:?}", removed);
        }
        implies_result.map(|_| ())
    }

    /// implies 推导到不动点，返回实际执行的轮数
    pub fn resolve_implies(&self, table: &mut CandidateTable) -> RswResult<usize> {
        for pass in 1..=self.max_passes {
            let known = table.len();
            let mut added = false;

            // 本轮只处理轮次开始时已存在的候选，新增候选留到下一轮
            for source_idx in 0..known {
                let source_rule = table.candidates[source_idx].tech.clone();
                for implied in &source_rule.implies {
                    let Some(target_rule) = self.compiled_lib.get(&implied.name) else {
                        return Err(RswappalyzerError::ImpliedTechNotFound {
                            tech: source_rule.name.clone(),
                            implied: implied.name.clone(),
                        });
                    };

                    let target_idx = match table.index_of(&implied.name) {
                        Some(idx) => idx,
                        None => {
                            added = true;
                            table.insert(CandidateState::implied(target_rule.clone()))
                        }
                    };
                    if target_idx == source_idx {
                        continue;
                    }

                    let (source, target) = table.pair_mut(source_idx, target_idx);
                    DetectionUpdater::propagate_implied(source, target, implied.confidence);
                }
            }

            if !added {
                debug!("implies 推导在第{}轮收敛，候选数：{}", pass, table.len());
                return Ok(pass);
            }
        }

        warn!("implies 推导达到轮数上限{}仍未收敛", self.max_passes);
        Err(RswappalyzerError::ImpliesNotConverged {
            passes: self.max_passes,
        })
    }

    /// 汇总所有候选的 excludes 后一次性移除（不传递），返回被移除的技术名
    pub fn resolve_excludes(&self, table: &mut CandidateTable) -> Vec<String> {
        let excluded: HashSet<String> = table
            .iter()
            .filter(|candidate| candidate.detected)
            .flat_map(|candidate| candidate.tech.excludes.iter().cloned())
            .collect();
        if excluded.is_empty() {
            return Vec::new();
        }

        let mut removed: Vec<String> = table
            .iter()
            .map(CandidateState::name)
            .filter(|name| excluded.contains(*name))
            .map(str::to_string)
            .collect();
        removed.sort_unstable();

        table.retain(|candidate| !excluded.contains(candidate.name()));
        removed
    }
}
