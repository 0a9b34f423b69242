//! Issue/return workflow and loan history

use chrono::{Duration, Months, Utc};
use uuid::Uuid;

use crate::{
    error::{AppError, AppResult},
    models::{
        loan_period::LoanPeriod,
        principal::Principal,
        transaction::{
            IssuedLoan, NewTransaction, OverdueTransactionView, TransactionFilter,
            TransactionQuery, TransactionView,
        },
        user::Role,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct TransactionsService {
    repository: Repository,
}

impl TransactionsService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    /// Lend a copy to the calling customer for `issue_for` (default one day)
    pub async fn issue_book(
        &self,
        principal: &Principal,
        book_id: &str,
        issue_for: &str,
    ) -> AppResult<IssuedLoan> {
        principal.require_role(&[Role::Customer], "issue book")?;
        let book_id = parse_id(book_id, "invalid book id")?;
        let period = LoanPeriod::parse(issue_for)?;

        let issued_at = Utc::now();
        let issued_till = period.due_from(issued_at)?;

        let transaction_id = self
            .repository
            .transactions
            .issue(NewTransaction {
                book_id,
                user_id: principal.user_id,
                issued_at,
                issued_till,
            })
            .await
            .inspect_err(|e| {
                tracing::debug!(%book_id, user_id = %principal.user_id, "Issue refused: {}", e);
            })?;

        tracing::info!(
            %transaction_id,
            %book_id,
            user_id = %principal.user_id,
            %issued_till,
            "Book issued"
        );
        Ok(IssuedLoan {
            transaction_id,
            issued_at,
            issued_till,
        })
    }

    /// Close the caller's open loan on a copy
    pub async fn return_book(&self, principal: &Principal, book_id: &str) -> AppResult<()> {
        principal.require_role(&[Role::Customer], "return book")?;
        let book_id = parse_id(book_id, "invalid book id")?;

        self.repository
            .transactions
            .return_book(book_id, principal.user_id, Utc::now())
            .await?;

        tracing::info!(%book_id, user_id = %principal.user_id, "Book returned");
        Ok(())
    }

    /// The caller's own loans. A transaction id overrides every other filter.
    pub async fn list_transactions(
        &self,
        principal: &Principal,
        query: TransactionQuery,
    ) -> AppResult<Vec<TransactionView>> {
        principal.require_authenticated()?;

        let filter = match query.transaction_id {
            Some(transaction_id) => TransactionFilter::ById {
                transaction_id,
                user_id: principal.user_id,
            },
            None => {
                let now = Utc::now();
                let issued_until = query.end_time.unwrap_or(now);
                let issued_from = query.start_time.unwrap_or_else(|| {
                    now.checked_sub_months(Months::new(1))
                        .unwrap_or(now - Duration::days(30))
                });
                if issued_from > issued_until {
                    return Err(AppError::InvalidInput(
                        "startTime must not be after endTime".to_string(),
                    ));
                }
                TransactionFilter::Search {
                    user_id: principal.user_id,
                    issued_from,
                    issued_until,
                    returned: query.returned,
                    book_title: query.book_title,
                }
            }
        };

        let transactions = self.repository.transactions.find(filter).await?;
        Ok(transactions.into_iter().map(TransactionView::from).collect())
    }

    /// Lookup by id, still limited to the caller's own loans
    pub async fn get_transaction(
        &self,
        principal: &Principal,
        transaction_id: &str,
    ) -> AppResult<Vec<TransactionView>> {
        principal.require_authenticated()?;
        let transaction_id = parse_id(transaction_id, "invalid transaction id")?;
        self.list_transactions(principal, TransactionQuery::by_id(transaction_id))
            .await
    }

    /// Staff see every overdue loan; customers only their own
    pub async fn list_overdue(&self, principal: &Principal) -> AppResult<Vec<OverdueTransactionView>> {
        principal.require_authenticated()?;

        let scope = (!principal.is_staff()).then_some(principal.user_id);
        let overdue = self
            .repository
            .transactions
            .overdue(scope, Utc::now())
            .await?;
        Ok(overdue.into_iter().map(OverdueTransactionView::from).collect())
    }
}

fn parse_id(value: &str, message: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value.trim()).map_err(|_| AppError::InvalidInput(message.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::{
            transaction::{NOT_RETURNED_YET, NOT_YET_RETURNED},
            user::NewUser,
        },
        repository::{MockBookStore, MockTransactionStore, MockUserStore},
    };
    use chrono::DateTime;
    use std::sync::Arc;

    struct Library {
        repository: Repository,
        service: TransactionsService,
    }

    impl Library {
        fn new() -> Self {
            let repository = Repository::in_memory();
            Self {
                service: TransactionsService::new(repository.clone()),
                repository,
            }
        }

        async fn member(&self, email: &str, role: Role) -> Principal {
            let user_id = self
                .repository
                .users
                .create(NewUser {
                    name: email.to_string(),
                    email: email.to_string(),
                    password_hash: String::new(),
                    role,
                })
                .await
                .unwrap();
            Principal {
                user_id,
                email: email.to_string(),
                role,
                expires_at: Utc::now() + Duration::hours(2),
            }
        }

        async fn copies(&self, title: &str, count: i64) -> Vec<Uuid> {
            self.repository
                .books
                .add_copies(title.to_string(), "Bar".to_string(), count)
                .await
                .unwrap()
        }

        /// Loan with explicit dates, bypassing the service clock
        async fn past_loan(
            &self,
            book_id: Uuid,
            user: &Principal,
            issued_at: DateTime<Utc>,
            issued_till: DateTime<Utc>,
        ) -> Uuid {
            self.repository
                .transactions
                .issue(NewTransaction {
                    book_id,
                    user_id: user.user_id,
                    issued_at,
                    issued_till,
                })
                .await
                .unwrap()
        }
    }

    fn untouched_storage() -> TransactionsService {
        TransactionsService::new(Repository::from_stores(
            Arc::new(MockBookStore::new()),
            Arc::new(MockTransactionStore::new()),
            Arc::new(MockUserStore::new()),
        ))
    }

    #[tokio::test]
    async fn test_staff_cannot_issue_or_return() {
        let service = untouched_storage();
        let staff = crate::models::principal::fixtures::principal(Role::Staff);
        let book_id = Uuid::new_v4().to_string();

        let err = service.issue_book(&staff, &book_id, "").await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "staff cant issue book"));

        let err = service.return_book(&staff, &book_id).await.unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(msg) if msg == "staff cant return book"));
    }

    #[tokio::test]
    async fn test_invalid_book_ids_are_rejected_before_storage() {
        let service = untouched_storage();
        let customer = crate::models::principal::fixtures::principal(Role::Customer);

        for id in ["", "42"] {
            let err = service.issue_book(&customer, id, "").await.unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(msg) if msg == "invalid book id"));
            let err = service.return_book(&customer, id).await.unwrap_err();
            assert!(matches!(err, AppError::InvalidInput(_)));
        }

        let err = service
            .issue_book(&customer, &Uuid::new_v4().to_string(), "a while")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_default_period_is_one_day() {
        let library = Library::new();
        let customer = library.member("reader@example.com", Role::Customer).await;
        let book = library.copies("Foo", 1).await[0];

        let loan = library
            .service
            .issue_book(&customer, &book.to_string(), "")
            .await
            .unwrap();
        assert_eq!(loan.issued_till - loan.issued_at, Duration::days(1));
    }

    #[tokio::test]
    async fn test_double_issue_conflicts_until_returned() {
        let library = Library::new();
        let customer = library.member("reader@example.com", Role::Customer).await;
        let other = library.member("other@example.com", Role::Customer).await;
        let book = library.copies("Foo", 1).await[0].to_string();

        let loan = library.service.issue_book(&customer, &book, "7 days").await.unwrap();
        assert_eq!(loan.issued_till - loan.issued_at, Duration::days(7));

        let err = library.service.issue_book(&other, &book, "").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg == "book not available"));
        let err = library.service.issue_book(&customer, &book, "").await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        // Only the holder can bring it back
        let err = library.service.return_book(&other, &book).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(msg) if msg.contains("nothing to return")));

        library.service.return_book(&customer, &book).await.unwrap();
        let err = library.service.return_book(&customer, &book).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));

        library.service.issue_book(&other, &book, "").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_issue_has_one_winner() {
        let library = Library::new();
        let book = library.copies("Foo", 1).await[0].to_string();
        let mut readers = Vec::new();
        for i in 0..8 {
            readers.push(library.member(&format!("reader{i}@example.com"), Role::Customer).await);
        }

        let attempts: Vec<_> = readers
            .into_iter()
            .map(|reader| {
                let service = library.service.clone();
                let book = book.clone();
                tokio::spawn(async move { service.issue_book(&reader, &book, "").await })
            })
            .collect();

        let mut winners = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => winners += 1,
                Err(e) => assert!(matches!(e, AppError::Conflict(_))),
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_history_is_scoped_to_caller() {
        let library = Library::new();
        let customer = library.member("reader@example.com", Role::Customer).await;
        let other = library.member("other@example.com", Role::Customer).await;
        let books = library.copies("Foo", 2).await;
        let other_book = library.copies("Elsewhere", 1).await[0];

        let mine = library
            .service
            .issue_book(&customer, &books[0].to_string(), "")
            .await
            .unwrap();
        library.service.issue_book(&customer, &books[1].to_string(), "").await.unwrap();
        library.service.return_book(&customer, &books[1].to_string()).await.unwrap();
        let theirs = library
            .service
            .issue_book(&other, &other_book.to_string(), "")
            .await
            .unwrap();

        let history = library
            .service
            .list_transactions(&customer, TransactionQuery::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert!(history.iter().all(|tx| tx.user_email == "reader@example.com"));

        let open = library
            .service
            .list_transactions(
                &customer,
                TransactionQuery {
                    returned: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].transaction_id, mine.transaction_id.to_string());
        assert_eq!(open[0].returned_at, NOT_RETURNED_YET);

        let by_title = library
            .service
            .list_transactions(
                &other,
                TransactionQuery {
                    book_title: Some("where".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(by_title.len(), 1);

        // Someone else's transaction id finds nothing
        let lookup = library
            .service
            .get_transaction(&customer, &theirs.transaction_id.to_string())
            .await
            .unwrap();
        assert!(lookup.is_empty());

        let lookup = library
            .service
            .get_transaction(&customer, &mine.transaction_id.to_string())
            .await
            .unwrap();
        assert_eq!(lookup.len(), 1);
        assert_eq!(lookup[0].book_name, "Foo");
    }

    #[tokio::test]
    async fn test_history_defaults_to_last_month() {
        let library = Library::new();
        let customer = library.member("reader@example.com", Role::Customer).await;
        let books = library.copies("Foo", 2).await;
        let now = Utc::now();

        library
            .past_loan(books[0], &customer, now - Duration::days(60), now - Duration::days(53))
            .await;
        let recent = library
            .past_loan(books[1], &customer, now - Duration::days(3), now + Duration::days(4))
            .await;

        let history = library
            .service
            .list_transactions(&customer, TransactionQuery::default())
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].transaction_id, recent.to_string());

        let all = library
            .service
            .list_transactions(
                &customer,
                TransactionQuery {
                    start_time: Some(now - Duration::days(90)),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(all.len(), 2);

        let err = library
            .service
            .list_transactions(
                &customer,
                TransactionQuery {
                    start_time: Some(now),
                    end_time: Some(now - Duration::days(1)),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_overdue_scoping_and_predicate() {
        let library = Library::new();
        let staff = library.member("staff@example.com", Role::Staff).await;
        let customer = library.member("reader@example.com", Role::Customer).await;
        let other = library.member("other@example.com", Role::Customer).await;
        let books = library.copies("Foo", 4).await;
        let now = Utc::now();
        let due = now - Duration::days(2);

        // Still out past the due date
        let late = library.past_loan(books[0], &customer, due - Duration::days(7), due).await;
        // Returned on time
        library.past_loan(books[1], &customer, due - Duration::days(7), due).await;
        library
            .repository
            .transactions
            .return_book(books[1], customer.user_id, due - Duration::hours(1))
            .await
            .unwrap();
        // Returned late
        library.past_loan(books[2], &other, due - Duration::days(7), due).await;
        library
            .repository
            .transactions
            .return_book(books[2], other.user_id, due + Duration::hours(1))
            .await
            .unwrap();
        // Not due yet
        library.past_loan(books[3], &other, now, now + Duration::days(7)).await;

        let mine = library.service.list_overdue(&customer).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].transaction_id, late.to_string());
        assert_eq!(mine[0].returned_at, NOT_YET_RETURNED);

        let everyone = library.service.list_overdue(&staff).await.unwrap();
        assert_eq!(everyone.len(), 2);
        assert!(everyone.iter().any(|tx| tx.returned_at != NOT_YET_RETURNED));
    }

    #[tokio::test]
    async fn test_storage_errors_propagate() {
        let mut transactions = MockTransactionStore::new();
        transactions
            .expect_overdue()
            .times(1)
            .returning(|_, _| Err(AppError::Internal("repository error".to_string())));
        let service = TransactionsService::new(Repository::from_stores(
            Arc::new(MockBookStore::new()),
            Arc::new(transactions),
            Arc::new(MockUserStore::new()),
        ));

        let staff = crate::models::principal::fixtures::principal(Role::Staff);
        let err = service.list_overdue(&staff).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(_)));
    }

    #[tokio::test]
    async fn test_staff_overdue_query_is_unscoped() {
        let mut transactions = MockTransactionStore::new();
        transactions
            .expect_overdue()
            .withf(|user_id, _| user_id.is_none())
            .times(1)
            .returning(|_, _| Ok(Vec::new()));
        let service = TransactionsService::new(Repository::from_stores(
            Arc::new(MockBookStore::new()),
            Arc::new(transactions),
            Arc::new(MockUserStore::new()),
        ));

        let staff = crate::models::principal::fixtures::principal(Role::Staff);
        assert!(service.list_overdue(&staff).await.unwrap().is_empty());
    }
}
