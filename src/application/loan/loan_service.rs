use chrono::{DateTime, Utc};

use crate::domain::{self, DomainEvent, Loan, LoanStatus, commands::*, value_objects::*};
use crate::ports::CopyReservation;

use super::errors::{LoanApplicationError, Result};
use super::view::LoanView;
use crate::application::ServiceDependencies;

/// 比較交換に負けたときの再試行回数の上限
const MAX_TRANSITION_ATTEMPTS: usize = 3;

/// 確定した状態遷移
struct CommittedTransition {
    /// 遷移前の貸出（取り消し用）
    previous: Loan,
    loan: Loan,
    event: DomainEvent,
    at: DateTime<Utc>,
}

/// リポジトリから貸出を取得するヘルパー関数
async fn load_loan(deps: &ServiceDependencies, loan_id: LoanId) -> Result<Loan> {
    deps.loan_repository
        .get_by_id(loan_id)
        .await
        .map_err(LoanApplicationError::LoanRepositoryError)?
        .ok_or(LoanApplicationError::LoanNotFound)
}

/// 状態遷移を比較交換で確定するヘルパー関数
///
/// 最新の貸出を読み込み、`transition`で次の状態を計算し、
/// 読み込んだリビジョンのままであれば置き換える。
/// 他の遷移に先を越された場合は読み直して再計算する。
/// 先行した遷移で終端状態になっていれば、`transition`自身が終端エラーを返す。
async fn commit_transition<F>(
    deps: &ServiceDependencies,
    loan_id: LoanId,
    transition: F,
) -> Result<CommittedTransition>
where
    F: Fn(Loan, DateTime<Utc>) -> Result<(Loan, DomainEvent)> + Send,
{
    for _ in 0..MAX_TRANSITION_ATTEMPTS {
        let current = load_loan(deps, loan_id).await?;
        let expected_revision = current.core().revision;
        let at = deps.clock.now();

        let (loan, event) = transition(current.clone(), at)?;

        let replaced = deps
            .loan_repository
            .replace(&loan, expected_revision)
            .await
            .map_err(LoanApplicationError::LoanRepositoryError)?;

        if replaced {
            return Ok(CommittedTransition {
                previous: current,
                loan,
                event,
                at,
            });
        }

        tracing::debug!(
            loan_id = %loan_id.value(),
            expected_revision,
            "loan changed concurrently, retrying transition"
        );
    }

    Err(LoanApplicationError::ConcurrentUpdate)
}

/// 台帳の更新に失敗した終端遷移を取り消すヘルパー関数
///
/// 遷移前の状態を次のリビジョンで書き戻し、呼び出し元が同じ操作を再試行できるようにする。
/// 書き戻しにも失敗した場合は、貸出と在庫が食い違ったままになるためエラーログに残す。
async fn revert_transition(deps: &ServiceDependencies, committed: CommittedTransition) {
    let loan_id = committed.loan.core().loan_id;
    let committed_revision = committed.loan.core().revision;
    let restored = domain::loan::restore(committed.previous, committed_revision, deps.clock.now());

    match deps
        .loan_repository
        .replace(&restored, committed_revision)
        .await
    {
        Ok(true) => {
            tracing::warn!(
                loan_id = %loan_id.value(),
                status = %restored.status().as_str(),
                "Inventory update failed, loan transition reverted"
            );
        }
        Ok(false) => {
            tracing::error!(
                loan_id = %loan_id.value(),
                "Loan changed before revert, loan and inventory may disagree"
            );
        }
        Err(e) => {
            tracing::error!(
                loan_id = %loan_id.value(),
                "Failed to revert loan transition: {}",
                e
            );
        }
    }
}

/// 監査用イベントログへの追記
///
/// イベントの版には遷移後のリビジョンを使う。
/// 貸出の現在状態はリポジトリが正であるため、追記の失敗は遷移を取り消さずログに残す。
async fn record_event(
    deps: &ServiceDependencies,
    loan_id: LoanId,
    revision: u32,
    event: DomainEvent,
) {
    let event_type = event.event_type();
    if let Err(e) = deps.loan_event_log.append(loan_id, revision, event).await {
        tracing::error!(
            loan_id = %loan_id.value(),
            event_type,
            "Failed to append loan event: {}",
            e
        );
    }
}

/// 書籍を貸し出す
///
/// ビジネスルール（確認順）：
/// - 利用者が存在すること
/// - 利用者が有効であること
/// - 未終了の貸出件数が役割ごとの上限未満であること
/// - 書籍が存在し、在庫台帳で1冊確保できること
///
/// 貸出上限は保存時にも利用者ごとに直列化して再確認する。
/// 在庫確保後に貸出を保存できなかった場合は、確保した1冊を戻してからエラーを返す。
pub async fn checkout_book(deps: &ServiceDependencies, cmd: CheckoutBook) -> Result<LoanView> {
    // 1. 利用者の確認
    let user = deps
        .user_directory
        .get_user(cmd.user_id)
        .await
        .map_err(LoanApplicationError::UserDirectoryError)?
        .ok_or(LoanApplicationError::UserNotFound)?;

    if !user.active {
        return Err(LoanApplicationError::UserInactive);
    }

    // 2. 貸出上限の確認
    let limit = deps.policy.max_active_loans(user.role);
    let open_loans = deps
        .loan_repository
        .count_open_for_user(user.user_id)
        .await
        .map_err(LoanApplicationError::LoanRepositoryError)?;

    if open_loans >= limit {
        return Err(LoanApplicationError::LoanLimitExceeded { limit });
    }

    // 3. 在庫の確保（書籍ごとに直列化される）
    let now = deps.clock.now();
    let reservation = deps
        .inventory_ledger
        .checkout_copy(cmd.book_id, now)
        .await
        .map_err(LoanApplicationError::InventoryLedgerError)?;

    match reservation {
        CopyReservation::Reserved(_) => {}
        CopyReservation::Unavailable => return Err(LoanApplicationError::BookUnavailable),
        CopyReservation::BookNotFound => return Err(LoanApplicationError::BookNotFound),
    }

    // 4. ドメイン層の純粋関数で貸出を生成
    let (active, event) =
        domain::loan::checkout_loan(cmd.book_id, user.user_id, user.role, now, &deps.policy);
    let loan_id = active.loan_id;
    let loan = Loan::Active(active);

    // 5. 貸出を保存。上限に達していたか失敗したら確保した1冊を戻す
    let failure = match deps.loan_repository.insert(&loan, limit).await {
        Ok(true) => None,
        Ok(false) => Some(LoanApplicationError::LoanLimitExceeded { limit }),
        Err(e) => {
            tracing::warn!(
                book_id = %cmd.book_id.value(),
                "Failed to persist loan, releasing reserved copy"
            );
            Some(LoanApplicationError::LoanRepositoryError(e))
        }
    };

    if let Some(err) = failure {
        if let Err(release_err) = deps.inventory_ledger.release_copy(cmd.book_id, now).await {
            tracing::error!(
                book_id = %cmd.book_id.value(),
                "Failed to release reserved copy: {}",
                release_err
            );
        }
        return Err(err);
    }

    record_event(deps, loan_id, loan.core().revision, DomainEvent::BookLoaned(event)).await;

    tracing::info!(
        loan_id = %loan_id.value(),
        book_id = %cmd.book_id.value(),
        user_id = %cmd.user_id.value(),
        "Book checked out"
    );

    Ok(LoanView::at(loan, now, &deps.policy))
}

/// 書籍を返却する
///
/// ビジネスルール：
/// - ActiveまたはOverdueの貸出のみ（延滞中でも返却は受け付ける）
/// - 返却済み・紛失済みは`LoanAlreadyTerminal`
///
/// 在庫の戻しは遷移を確定できた呼び出しだけが行うため、二重に戻ることはない。
/// 在庫の戻しに失敗した場合は遷移を取り消すため、同じ返却を再試行できる。
pub async fn return_loan(deps: &ServiceDependencies, cmd: ReturnLoan) -> Result<LoanView> {
    let committed = commit_transition(deps, cmd.loan_id, |loan, at| {
        let (returned, event) = domain::loan::return_loan(loan, at)?;
        Ok((Loan::Returned(returned), DomainEvent::BookReturned(event)))
    })
    .await?;

    let book_id = committed.loan.core().book_id;
    let released = match deps
        .inventory_ledger
        .release_copy(book_id, committed.at)
        .await
    {
        Ok(released) => released,
        Err(e) => {
            revert_transition(deps, committed).await;
            return Err(LoanApplicationError::InventoryLedgerError(e));
        }
    };

    if released.is_none() {
        tracing::warn!(
            loan_id = %cmd.loan_id.value(),
            book_id = %book_id.value(),
            "Returned loan references a missing book"
        );
    }

    let revision = committed.loan.core().revision;
    record_event(deps, cmd.loan_id, revision, committed.event).await;

    tracing::info!(loan_id = %cmd.loan_id.value(), "Loan returned");

    Ok(LoanView::at(committed.loan, committed.at, &deps.policy))
}

/// 貸出を延長する
///
/// ビジネスルール：
/// - 読み出し時刻で再計算した状態がActiveであること（期限超過は延長不可）
/// - 延長回数がポリシーの上限未満であること
pub async fn extend_loan(deps: &ServiceDependencies, cmd: ExtendLoan) -> Result<LoanView> {
    let policy = deps.policy;
    let committed = commit_transition(deps, cmd.loan_id, |loan, at| {
        let (extended, event) = domain::loan::extend_loan(loan, at, &policy)?;
        Ok((Loan::Active(extended), DomainEvent::LoanExtended(event)))
    })
    .await?;

    let revision = committed.loan.core().revision;
    record_event(deps, cmd.loan_id, revision, committed.event).await;

    tracing::info!(
        loan_id = %cmd.loan_id.value(),
        due_date = %committed.loan.core().due_date,
        "Loan extended"
    );

    Ok(LoanView::at(committed.loan, committed.at, &deps.policy))
}

/// 貸出中の書籍を紛失扱いにする
///
/// ビジネスルール：
/// - ActiveまたはOverdueの貸出のみ
/// - 書籍の総数を1減らす（貸出可能数は総数で頭打ち）
///
/// 台帳の更新に失敗した場合は遷移を取り消す。
pub async fn mark_loan_lost(deps: &ServiceDependencies, cmd: MarkLoanLost) -> Result<LoanView> {
    let committed = commit_transition(deps, cmd.loan_id, |loan, at| {
        let (lost, event) = domain::loan::mark_lost(loan, at)?;
        Ok((Loan::Lost(lost), DomainEvent::BookLost(event)))
    })
    .await?;

    let book_id = committed.loan.core().book_id;
    let written_off = match deps
        .inventory_ledger
        .write_off_copy(book_id, committed.at)
        .await
    {
        Ok(written_off) => written_off,
        Err(e) => {
            revert_transition(deps, committed).await;
            return Err(LoanApplicationError::InventoryLedgerError(e));
        }
    };

    if written_off.is_none() {
        tracing::warn!(
            loan_id = %cmd.loan_id.value(),
            book_id = %book_id.value(),
            "Lost loan references a missing book"
        );
    }

    let revision = committed.loan.core().revision;
    record_event(deps, cmd.loan_id, revision, committed.event).await;

    tracing::info!(loan_id = %cmd.loan_id.value(), "Loan marked as lost");

    Ok(LoanView::at(committed.loan, committed.at, &deps.policy))
}

/// 貸出の現在状態を取得する
///
/// 延滞検出バッチが未実行でも、返却期限を過ぎていればOverdueとして返す。
pub async fn get_loan_status(deps: &ServiceDependencies, loan_id: LoanId) -> Result<LoanView> {
    let loan = load_loan(deps, loan_id).await?;
    Ok(LoanView::at(loan, deps.clock.now(), &deps.policy))
}

/// 利用者の貸出一覧を取得する
///
/// `status`を指定した場合は、再計算後のステータスで絞り込む。
pub async fn list_loans_for_user(
    deps: &ServiceDependencies,
    user_id: UserId,
    status: Option<LoanStatus>,
) -> Result<Vec<LoanView>> {
    let loans = deps
        .loan_repository
        .find_by_user_id(user_id)
        .await
        .map_err(LoanApplicationError::LoanRepositoryError)?;

    let now = deps.clock.now();
    Ok(loans
        .into_iter()
        .map(|loan| LoanView::at(loan, now, &deps.policy))
        .filter(|view| status.is_none_or(|s| view.status == s))
        .collect())
}

/// 延滞中の貸出一覧を取得する
///
/// 延滞検出バッチで確定済みのものと、返却期限を過ぎたが未確定のものの両方を返却期限順に返す。
pub async fn list_overdue_loans(deps: &ServiceDependencies) -> Result<Vec<LoanView>> {
    let now = deps.clock.now();
    let loans = deps
        .loan_repository
        .find_overdue(now)
        .await
        .map_err(LoanApplicationError::LoanRepositoryError)?;

    Ok(loans
        .into_iter()
        .map(|loan| LoanView::at(loan, now, &deps.policy))
        .filter(|view| view.status == LoanStatus::Overdue)
        .collect())
}

/// 貸出の履歴（ドメインイベント）を取得する
pub async fn loan_history(deps: &ServiceDependencies, loan_id: LoanId) -> Result<Vec<DomainEvent>> {
    // 貸出が存在しない場合は空の履歴ではなくNotFound
    load_loan(deps, loan_id).await?;

    deps.loan_event_log
        .load(loan_id)
        .await
        .map_err(LoanApplicationError::EventLogError)
}
