// ==========================================
// 物料分拣系统 - 命令行入口
// ==========================================
// 技术栈: clap + Rust + SQLite
// 输出: JSON（stdout），日志写 stderr
// ==========================================

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use material_separation::api::{OrderSearchFilter, ReportFilter, ReportKind, StatusFilter};
use material_separation::app::{get_default_db_path, AppState};
use material_separation::domain::Operator;
use material_separation::i18n;
use material_separation::importer::seed_demo_data;

#[derive(Debug, Parser)]
#[command(name = "material-separation")]
#[command(about = "物料分拣系统 - 工单物料分拣与替代料核对", version)]
struct Cli {
    /// 数据库文件（默认读取 MATERIAL_SEPARATION_DB_PATH 或用户数据目录）
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// 操作员用户名
    #[arg(long, global = true, default_value = "operador")]
    operator: String,

    /// 界面语言（pt-BR / en / zh-CN）
    #[arg(long, global = true)]
    locale: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// 写入演示目录与工单
    Seed,
    /// 导入物料目录 CSV
    ImportCatalog(FileArgs),
    /// 导入工单 CSV
    ImportOrders(FileArgs),
    /// 待分拣工单检索
    Orders(OrdersArgs),
    /// 打开（或新建 / 重开）分拣清单
    Open(OrderArgs),
    /// 查看进行中的分拣清单
    Show(OrderArgs),
    /// 设定标准料数量
    SetOfficial(SetOfficialArgs),
    /// 列出物料行的可用替代料
    Alternatives(AlternativesArgs),
    /// 选用替代料并设定数量
    UseAlt(UseAltArgs),
    /// 物料行当前编码的图纸链接
    Drawing(ItemArgs),
    /// 保存清单（全部完成归档 / 部分完成）
    Save(OrderArgs),
    /// 删除工单的全部分拣记录
    Discard(OrderArgs),
    /// 已全部完成的分拣
    Finalized(FinalizedArgs),
    /// 报表列表
    Reports(ReportsArgs),
    /// 报表明细
    Report(OrderArgs),
    /// 导出 CSV
    ExportCsv(ExportArgs),
}

#[derive(Debug, Args)]
struct FileArgs {
    path: PathBuf,
}

#[derive(Debug, Args)]
struct OrderArgs {
    order_id: String,
}

#[derive(Debug, Args)]
struct OrdersArgs {
    #[arg(long)]
    order_id: Option<String>,
    #[arg(long)]
    product: Option<String>,
    #[arg(long)]
    operation: Option<String>,
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
    /// todas / parcial / sem-separacao
    #[arg(long, default_value = "todas")]
    status: StatusFilter,
}

#[derive(Debug, Args)]
struct SetOfficialArgs {
    order_id: String,
    index: usize,
    quantity: String,
}

#[derive(Debug, Args)]
struct ItemArgs {
    order_id: String,
    index: usize,
}

#[derive(Debug, Args)]
struct AlternativesArgs {
    order_id: String,
    index: usize,
    #[arg(long, default_value = "")]
    search: String,
}

#[derive(Debug, Args)]
struct UseAltArgs {
    order_id: String,
    index: usize,
    alt_code: String,
    quantity: String,
}

#[derive(Debug, Args)]
struct FinalizedArgs {
    #[arg(long)]
    text: Option<String>,
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(Debug, Args)]
struct ReportsArgs {
    /// total / parcial / todos
    #[arg(long, default_value = "todos")]
    kind: ReportKind,
    #[arg(long)]
    order_id: Option<String>,
    #[arg(long)]
    product: Option<String>,
    #[arg(long)]
    operation: Option<String>,
    #[arg(long)]
    from: Option<NaiveDate>,
    #[arg(long)]
    to: Option<NaiveDate>,
}

#[derive(Debug, Args)]
struct ExportArgs {
    /// total / parcial / todos
    #[arg(long, default_value = "todos")]
    kind: ReportKind,
    /// 仅导出指定工单（可重复）
    #[arg(long = "order")]
    orders: Vec<String>,
    /// 输出文件（缺省写 stdout）
    #[arg(long)]
    out: Option<PathBuf>,
}

fn main() -> Result<()> {
    material_separation::logging::init();
    let cli = Cli::parse();

    let db_path = cli
        .db
        .as_ref()
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_else(get_default_db_path);
    tracing::debug!(db_path = %db_path, "使用数据库");

    let state = AppState::new(db_path).map_err(anyhow::Error::msg)?;
    if let Some(locale) = &cli.locale {
        anyhow::ensure!(i18n::is_supported(locale), "不支持的语言: {}", locale);
        i18n::set_locale(locale);
    }
    let operator = Operator::new(cli.operator.trim());

    match cli.command {
        Command::Seed => print_json(&seed_demo_data(&state.order_repo, &state.catalog_repo)?),
        Command::ImportCatalog(args) => print_json(
            &state
                .importer
                .import_catalog(&args.path, &operator.username)
                .map_err(|e| anyhow::anyhow!(e.localized()))?,
        ),
        Command::ImportOrders(args) => print_json(
            &state
                .importer
                .import_orders(&args.path, &operator.username)
                .map_err(|e| anyhow::anyhow!(e.localized()))?,
        ),
        Command::Orders(args) => {
            let filter = OrderSearchFilter {
                order_id: args.order_id,
                product: args.product,
                operation: args.operation,
                created_from: args.from,
                created_to: args.to,
                status: args.status,
            };
            print_json(&state.query_api.list_orders_for_separation(&filter)?)
        }
        Command::Open(args) => {
            print_json(&state.separation_api.open_checklist(&args.order_id, &operator)?)
        }
        Command::Show(args) => print_json(&state.separation_api.get_checklist(&args.order_id)?),
        Command::SetOfficial(args) => print_json(&state.separation_api.set_official_quantity(
            &args.order_id,
            args.index,
            &args.quantity,
            &operator,
        )?),
        Command::Alternatives(args) => print_json(&state.separation_api.list_alternatives(
            &args.order_id,
            args.index,
            &args.search,
        )?),
        Command::UseAlt(args) => print_json(&state.separation_api.choose_alternative(
            &args.order_id,
            args.index,
            &args.alt_code,
            &args.quantity,
            &operator,
        )?),
        Command::Drawing(args) => print_json(
            &state
                .separation_api
                .item_drawing(&args.order_id, args.index)?,
        ),
        Command::Save(args) => print_json(&state.separation_api.save(&args.order_id)?),
        Command::Discard(args) => print_json(&state.separation_api.discard(&args.order_id)?),
        Command::Finalized(args) => print_json(&state.query_api.list_finalized(
            args.text.as_deref(),
            args.from,
            args.to,
        )?),
        Command::Reports(args) => {
            let filter = ReportFilter {
                kind: args.kind,
                order_id: args.order_id,
                product: args.product,
                operation: args.operation,
                finished_from: args.from,
                finished_to: args.to,
            };
            print_json(&state.query_api.list_reports(&filter)?)
        }
        Command::Report(args) => print_json(&state.report_api.get_report(&args.order_id)?),
        Command::ExportCsv(args) => {
            let records = state.report_api.select_records(args.kind, &args.orders)?;
            anyhow::ensure!(!records.is_empty(), "没有可导出的记录");
            let locale = i18n::current_locale();
            let rows = match &args.out {
                Some(path) => {
                    let file = File::create(path)
                        .with_context(|| format!("无法创建文件: {}", path.display()))?;
                    state
                        .report_api
                        .export_csv(&records, BufWriter::new(file), &locale)?
                }
                None => state
                    .report_api
                    .export_csv(&records, io::stdout().lock(), &locale)?,
            };
            tracing::info!(rows, "导出完成");
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let mut out = io::stdout().lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}
