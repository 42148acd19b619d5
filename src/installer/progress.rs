//! 加权进度聚合
//!
//! 整个运行被切成若干阶段，每个阶段占固定权重，所有权重之和为 100。
//! 阶段内按已完成单位数线性推进；阶段结束时跳到 `offset + weight` 检查点，
//! 没有任何单位的阶段直接跳到检查点。对外的进度值单调不减并限制在 [0, 100]。

/// 解压阶段权重
pub const EXTRACTION_WEIGHT: f64 = 80.0;

/// 总权重
pub const TOTAL_WEIGHT: f64 = 100.0;

/// 已开始的阶段
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressStage {
    pub label: String,
    pub weight: f64,
    /// 阶段开始时已分配的权重之和
    pub offset: f64,
}

impl ProgressStage {
    /// 阶段结束时的检查点
    pub fn checkpoint(&self) -> f64 {
        self.offset + self.weight
    }
}

#[derive(Debug)]
struct ActiveStage {
    stage: ProgressStage,
    units: usize,
    done: usize,
}

/// 进度聚合器
#[derive(Debug, Default)]
pub struct ProgressAggregator {
    value: f64,
    applied: f64,
    active: Option<ActiveStage>,
    history: Vec<ProgressStage>,
}

impl ProgressAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 当前进度
    pub fn value(&self) -> f64 {
        self.value
    }

    /// 已分配给阶段的权重之和
    pub fn applied_weight(&self) -> f64 {
        self.applied
    }

    /// 尚未分配的权重
    pub fn remaining_weight(&self) -> f64 {
        (TOTAL_WEIGHT - self.applied).max(0.0)
    }

    /// 已开始过的阶段，按开始顺序
    pub fn stages(&self) -> &[ProgressStage] {
        &self.history
    }

    /// 开始新阶段，未结束的上一阶段先结束
    ///
    /// 权重超出剩余部分时截断，保证总和不超过 100
    pub fn begin_stage(&mut self, label: impl Into<String>, weight: f64, units: usize) -> f64 {
        self.finish_stage();

        let weight = weight.max(0.0).min(self.remaining_weight());
        let stage = ProgressStage {
            label: label.into(),
            weight,
            offset: self.applied,
        };
        self.applied += weight;
        self.history.push(stage.clone());
        self.active = Some(ActiveStage {
            stage,
            units,
            done: 0,
        });

        if units == 0 {
            self.finish_stage();
        }
        self.value
    }

    /// 当前阶段完成一个单位
    pub fn advance(&mut self) -> f64 {
        let target = match self.active.as_mut() {
            Some(active) if active.units > 0 => {
                active.done = (active.done + 1).min(active.units);
                let fraction = active.done as f64 / active.units as f64;
                Some(active.stage.offset + active.stage.weight * fraction)
            }
            _ => None,
        };
        if let Some(target) = target {
            self.raise(target);
        }
        self.value
    }

    /// 按比例设置当前阶段的进度
    pub fn report(&mut self, fraction: f64) -> f64 {
        if let Some(active) = &self.active {
            let fraction = if fraction.is_finite() {
                fraction.clamp(0.0, 1.0)
            } else {
                0.0
            };
            let target = active.stage.offset + active.stage.weight * fraction;
            self.raise(target);
        }
        self.value
    }

    /// 结束当前阶段，跳到其检查点
    pub fn finish_stage(&mut self) -> f64 {
        if let Some(active) = self.active.take() {
            self.raise(active.stage.checkpoint());
        }
        self.value
    }

    /// 整个运行完成
    pub fn complete(&mut self) -> f64 {
        self.finish_stage();
        self.applied = TOTAL_WEIGHT;
        self.raise(TOTAL_WEIGHT);
        self.value
    }

    fn raise(&mut self, target: f64) {
        let target = target.clamp(0.0, TOTAL_WEIGHT);
        if target > self.value {
            self.value = target;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_installer_checkpoints() {
        let mut progress = ProgressAggregator::new();
        progress.begin_stage("extract", EXTRACTION_WEIGHT, 4);
        assert_eq!(progress.advance(), 20.0);
        assert_eq!(progress.advance(), 40.0);
        progress.advance();
        assert_eq!(progress.advance(), 80.0);

        let mut checkpoints = Vec::new();
        for host in ["revit", "cad", "rhino", "sketchup"] {
            progress.begin_stage(host, 5.0, 2);
            progress.advance();
            checkpoints.push(progress.finish_stage());
        }
        assert_eq!(checkpoints, vec![85.0, 90.0, 95.0, 100.0]);
        assert_eq!(progress.applied_weight(), TOTAL_WEIGHT);
    }

    #[test]
    fn test_zero_unit_stage_jumps_to_checkpoint() {
        let mut progress = ProgressAggregator::new();
        progress.begin_stage("extract", EXTRACTION_WEIGHT, 0);
        assert_eq!(progress.value(), 80.0);
        assert_eq!(progress.begin_stage("revit", 5.0, 0), 85.0);
    }

    #[test]
    fn test_weight_is_truncated_to_remaining() {
        let mut progress = ProgressAggregator::new();
        progress.begin_stage("extract", EXTRACTION_WEIGHT, 0);
        progress.begin_stage("greedy", 50.0, 0);
        assert_eq!(progress.value(), 100.0);
        assert_eq!(progress.stages()[1].weight, 20.0);
        assert_eq!(progress.remaining_weight(), 0.0);
    }

    #[test]
    fn test_report_is_clamped_and_monotonic() {
        let mut progress = ProgressAggregator::new();
        progress.begin_stage("extract", EXTRACTION_WEIGHT, 10);
        assert_eq!(progress.report(0.5), 40.0);
        assert_eq!(progress.report(0.25), 40.0);
        assert_eq!(progress.report(7.0), 80.0);
        assert_eq!(progress.report(f64::NAN), 80.0);
    }

    #[test]
    fn test_advance_without_stage_is_noop() {
        let mut progress = ProgressAggregator::new();
        assert_eq!(progress.advance(), 0.0);
        assert_eq!(progress.complete(), 100.0);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Begin(f64, usize),
        Advance,
        Report(f64),
        Finish,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0.0..60.0f64, 0usize..6).prop_map(|(w, u)| Op::Begin(w, u)),
            Just(Op::Advance),
            (-1.0..2.0f64).prop_map(Op::Report),
            Just(Op::Finish),
        ]
    }

    proptest! {
        #[test]
        fn prop_progress_never_decreases(ops in prop::collection::vec(op(), 0..40)) {
            let mut progress = ProgressAggregator::new();
            let mut last = progress.value();

            for op in ops {
                let value = match op {
                    Op::Begin(weight, units) => progress.begin_stage("stage", weight, units),
                    Op::Advance => progress.advance(),
                    Op::Report(fraction) => progress.report(fraction),
                    Op::Finish => progress.finish_stage(),
                };
                prop_assert!(value >= last);
                prop_assert!((0.0..=TOTAL_WEIGHT).contains(&value));
                prop_assert!(progress.applied_weight() <= TOTAL_WEIGHT);
                last = value;
            }

            prop_assert_eq!(progress.complete(), TOTAL_WEIGHT);
        }
    }
}
