//! 检测器核心：整合各类分析器，输出检测结果
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::analyzer::{
    Analyzer, EnvAnalyzer, HeaderAnalyzer, HtmlAnalyzer, JsAnalyzer, MetaAnalyzer, ScriptAnalyzer, UrlAnalyzer,
};
use super::candidate::CandidateState;
use super::resolver::{CandidateTable, RelationResolver};
use super::result::ResultSet;
use crate::compiler::{CompiledRuleLibrary, RuleCompiler};
use crate::config::DetectorConfig;
use crate::error::{RswResult, RswappalyzerError};
use crate::rule::RuleLibrary;
use crate::signal::{SignalBundle, SignalBundleBuilder, extract_meta_tags};

/// 技术检测器
#[derive(Debug, Clone)]
pub struct TechDetector {
    compiled_lib: Arc<CompiledRuleLibrary>,
    config: DetectorConfig,
}

impl TechDetector {
    /// 编译规则库并创建检测器
    pub fn new(rule_lib: &RuleLibrary, config: DetectorConfig) -> RswResult<Self> {
        if rule_lib.tech_rules.is_empty() {
            return Err(RswappalyzerError::InvalidInput("规则库为空，无法创建检测器".to_string()));
        }
        let compiled_lib = RuleCompiler::compile(rule_lib);
        Ok(Self::with_compiled_lib(compiled_lib, config))
    }

    /// 使用已编译的规则库创建检测器
    pub fn with_compiled_lib(compiled_lib: CompiledRuleLibrary, config: DetectorConfig) -> Self {
        Self {
            compiled_lib: Arc::new(compiled_lib),
            config,
        }
    }

    pub fn compiled_lib(&self) -> &CompiledRuleLibrary {
        &self.compiled_lib
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// 按当前配置创建信号包构建器
    pub fn bundle_builder(&self) -> SignalBundleBuilder {
        SignalBundle::builder().extract_scripts(self.config.extract_scripts)
    }

    /// 核心检测接口
    pub fn analyze(&self, bundle: &SignalBundle) -> ResultSet {
        let start = Instant::now();
        let verbose = self.config.verbose;

        // 1. meta 标签每个信号包只提取一次
        let meta_tags = if bundle.body().is_empty() {
            Vec::new()
        } else {
            extract_meta_tags(bundle.body())
        };

        // 2. 逐技术扫描（按名称排序保证结果稳定）
        let mut tech_names: Vec<&String> = self.compiled_lib.tech_patterns.keys().collect();
        tech_names.sort_unstable();

        let mut table = CandidateTable::new();
        for name in tech_names {
            let tech = &self.compiled_lib.tech_patterns[name];
            let mut candidate = CandidateState::new(tech.clone());

            if !bundle.body().is_empty() {
                HtmlAnalyzer::analyze(bundle.body(), &mut candidate, verbose);
                MetaAnalyzer::analyze(meta_tags.as_slice(), &mut candidate, verbose);
            }
            if !bundle.scripts().is_empty() {
                ScriptAnalyzer::analyze(bundle.scripts(), &mut candidate, verbose);
            }
            if !bundle.headers().is_empty() {
                HeaderAnalyzer::analyze(bundle.headers(), &mut candidate, verbose);
            }
            if !bundle.env().is_empty() {
                EnvAnalyzer::analyze(bundle.env(), &mut candidate, verbose);
            }
            if !bundle.url().is_empty() {
                UrlAnalyzer::analyze(bundle.url(), &mut candidate, verbose);
            }
            table.insert(candidate);
        }

        // 3. JS探针结果
        for (tech_name, probes) in bundle.js() {
            match table.get_mut(tech_name) {
                Some(candidate) => JsAnalyzer::analyze(probes, candidate, verbose),
                None => debug!("探针结果对应的技术不在规则库中，已忽略：{}", tech_name),
            }
        }

        // 4. 丢弃未检出 / 置信度为0的候选
        table.retain(CandidateState::is_confirmed);
        let direct_count = table.len();

        // 5. implies / excludes
        let resolver = RelationResolver::new(
            &self.compiled_lib,
            self.config.implies_pass_cap(self.compiled_lib.len()),
        );
        let resolve_error = resolver.resolve(&mut table).err();
        if let Some(err) = &resolve_error {
            warn!("关联解析未完成，返回部分结果：{}", err);
        }

        // 6. 最终过滤
        table.retain(CandidateState::is_confirmed);

        debug!(
            "检测完成，耗时{:?}，直接命中{}个，最终结果{}个",
            start.elapsed(),
            direct_count,
            table.len()
        );
        ResultSet::new(table.into_map(), resolve_error)
    }

    /// 批量检测：每个信号包在阻塞线程池中独立检测，信号量限制并发度
    pub async fn analyze_batch(&self, bundles: Vec<SignalBundle>) -> RswResult<Vec<ResultSet>> {
        let semaphore = Arc::new(Semaphore::new(self.config.batch_concurrency.max(1)));
        let mut handles = Vec::with_capacity(bundles.len());

        for bundle in bundles {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| RswappalyzerError::AsyncTaskError(format!("获取并发许可失败：{}", e)))?;
            let detector = self.clone();
            handles.push(tokio::task::spawn_blocking(move || {
                let _permit = permit;
                detector.analyze(&bundle)
            }));
        }

        let mut results = Vec::with_capacity(handles.len());
        for handle in handles {
            let result = handle
                .await
                .map_err(|e| RswappalyzerError::AsyncTaskError(format!("检测任务执行失败：{}", e)))?;
            results.push(result);
        }
        Ok(results)
    }
}
