// ==========================================
// 商品数据导入 - 导入步骤 Trait
// ==========================================
// 职责: 定义导入步骤接口（不包含实现）
// 约定: 步骤按注册顺序执行,每个步骤读取/写入同一个 DataSet
// ==========================================

use crate::importer::data_set::DataSet;
use crate::importer::error::ImportResult;

// ==========================================
// ImportStep Trait
// ==========================================
// 用途: 管道中的单个转换单元
// 实现者: ProductAbstractHydratorStep, 各提取步骤
pub trait ImportStep: Send + Sync {
    /// 步骤名称（用于日志）
    fn name(&self) -> &'static str;

    /// 执行步骤
    ///
    /// # 参数
    /// - data_set: 当前行数据（可变）
    ///
    /// # 返回
    /// - Ok(()): 执行成功,派生值已写回 data_set
    /// - Err: 行级错误（由管道按失败策略处理）或致命错误
    fn execute(&self, data_set: &mut DataSet) -> ImportResult<()>;
}
