use crate::domain::{self, DomainEvent, Loan};

use super::errors::{LoanApplicationError, Result};
use crate::application::ServiceDependencies;

/// 延滞検出バッチ
///
/// 定期的に実行され、返却期限を過ぎたActive状態の貸出の保存済みステータスを
/// Overdueに更新し、LoanBecameOverdueイベントを記録する。
///
/// ビジネスルール：
/// - 保存済みステータスがActiveで、返却期限（due_date）を過ぎた貸出のみ対象
/// - 既にOverdue、または終端状態の貸出は処理しない（重複イベント防止）
///
/// 読み出し側は常に延滞を再計算するため、このバッチは保存済みステータスを
/// 揃えるためのもので、正しさには影響しない。書籍の在庫には触れない。
///
/// # 戻り値
/// 延滞として確定した貸出の件数
pub async fn detect_overdue_loans(deps: &ServiceDependencies) -> Result<usize> {
    let now = deps.clock.now();
    let mut detected_count = 0;

    // 1. 延滞候補を取得
    let candidates = deps
        .loan_repository
        .find_overdue_candidates(now)
        .await
        .map_err(LoanApplicationError::LoanRepositoryError)?;

    // 2. 各候補を1件ずつ確定する
    for candidate in candidates {
        let active = match candidate {
            Loan::Active(active) if now > active.due_date => active,
            _ => continue,
        };

        let loan_id = active.loan_id;
        let expected_revision = active.revision;
        let (overdue, event) = domain::loan::mark_overdue(active, now);
        let revision = overdue.revision;

        // 候補の取得後に返却・延長された貸出は上書きしない
        let replaced = deps
            .loan_repository
            .replace(&Loan::Overdue(overdue), expected_revision)
            .await
            .map_err(LoanApplicationError::LoanRepositoryError)?;

        if !replaced {
            tracing::debug!(
                loan_id = %loan_id.value(),
                "Loan changed since overdue scan, skipping"
            );
            continue;
        }

        if let Err(e) = deps
            .loan_event_log
            .append(loan_id, revision, DomainEvent::LoanBecameOverdue(event))
            .await
        {
            tracing::error!(loan_id = %loan_id.value(), "Failed to append overdue event: {}", e);
        }

        detected_count += 1;
    }

    if detected_count > 0 {
        tracing::info!(detected_count, "Overdue loans detected");
    }

    Ok(detected_count)
}
