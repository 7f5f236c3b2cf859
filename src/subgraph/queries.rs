//! GraphQL documents for the indexed read path.
//!
//! One document per screen-level read, named after the question it answers.
//! Status filters use the schema's enum values unquoted. Selections that
//! repeat verbatim across documents are spliced from a single constant so
//! the row shapes cannot drift apart.

use once_cell::sync::Lazy;

const LOAN_FIELDS: &str =
    "id tokenId borrower { id } lender { id } loanAmount interest dueDate createdAt";

const MINTED_FIELDS: &str = "id tokenId owner ipfsCID blockNumber blockTimestamp transactionHash";

pub static GET_MINTED_INVOICES: Lazy<String> = Lazy::new(|| {
    format!(
        r#"query GetMintedInvoices($owner: Bytes!) {{
  invoiceMinteds(where: {{ owner: $owner }}) {{ {MINTED_FIELDS} }}
}}"#
    )
});

pub const GET_INVOICES_BY_OWNER: &str = r#"query GetInvoicesByOwner($owner: Bytes!) {
  invoices(where: { borrower: $owner }) {
    tokenId
    borrower { id }
    lender { id }
    loanAmount
    payerName
    interest
    dueDate
    status
    createdAt
  }
}"#;

pub static GET_LISTED_INVOICES: Lazy<String> = Lazy::new(|| {
    format!(
        r#"query GetListedInvoices {{
  invoices(where: {{ status: LISTED }}) {{ {LOAN_FIELDS} }}
}}"#
    )
});

pub const GET_USER_REPUTATION: &str = r#"query GetUserReputation($user: Bytes!) {
  borrower(id: $user) {
    id
    reputation
  }
}"#;

pub static GET_ACTIVE_LOANS: Lazy<String> = Lazy::new(|| {
    format!(
        r#"query GetActiveLoans {{
  invoices(where: {{ status: LOANED }}) {{ {LOAN_FIELDS} }}
}}"#
    )
});

pub static GET_DUE_SOON_LOANS: Lazy<String> = Lazy::new(|| {
    format!(
        r#"query GetDueSoonLoans($userAddress: Bytes!, $currentDate: BigInt!, $threeDaysLater: BigInt!) {{
  borrowerInvoices: invoices(where: {{ borrower: $userAddress, status: LOANED, dueDate_gte: $currentDate, dueDate_lte: $threeDaysLater }}) {{ {LOAN_FIELDS} }}
  lenderInvoices: invoices(where: {{ lender: $userAddress, status: LOANED, dueDate_gte: $currentDate, dueDate_lte: $threeDaysLater }}) {{ {LOAN_FIELDS} }}
}}"#
    )
});

pub const GET_TOTAL_BORROWED_AND_LENT_BY_USER: &str =
    r#"query GetTotalBorrowedAndLentByUser($user: Bytes!) {
  borrowers(where: { id: $user }) {
    id
    invoices { loanAmount }
  }
  lenders(where: { id: $user }) {
    id
    loans { loanAmount }
  }
}"#;

pub const GET_ALL_INVOICES_WITH_IPFS: &str =
    r#"query GetAllInvoicesWithIPFS($first: Int = 100, $skip: Int = 0) {
  invoices(first: $first, skip: $skip) {
    id
    tokenId
    borrower { id address }
    lender { id address }
    token { id address }
    loanAmount
    interest
    dueDate
    isActive
    amount
    payerName
    riskFactor
    createdAt
    status
  }
  invoiceMinteds(first: 1000) {
    tokenId
    ipfsCID
    owner
    blockTimestamp
  }
}"#;

pub const GET_YOUR_OFFERS_SENT: &str = r#"query GetYourOffersSent($lenderId: Bytes!) {
  offers(where: { lender_: { id: $lenderId } }) {
    id
    invoice {
      id
      loanAmount
      dueDate
      status
      borrower { id }
    }
    token { id }
    amount
    interest
    status
    createdAt
  }
}"#;

pub const GET_INVOICE_IDS_BY_BORROWER: &str =
    r#"query GetInvoiceIdsByBorrower($borrowerId: Bytes!) {
  invoices(where: { borrower: $borrowerId }) {
    id
  }
}"#;

pub const GET_YOUR_OFFERS_RECEIVED: &str = r#"query GetYourOffersReceived($invoiceIds: [ID!]!) {
  offers(where: { invoice_in: $invoiceIds }) {
    id
    invoice {
      id
      loanAmount
      dueDate
      status
    }
    lender { id }
    amount
    interest
    status
    createdAt
  }
}"#;

pub const GET_ACTIVE_LOANS_AS_BORROWER: &str =
    r#"query GetActiveLoansAsBorrower($borrowerId: Bytes!) {
  invoices(where: { borrower: $borrowerId, status: LOANED }) {
    id
    tokenId
    lender { id }
    loanAmount
    interest
    dueDate
    createdAt
  }
}"#;

pub const GET_ACTIVE_LOANS_AS_LENDER: &str =
    r#"query GetActiveLoansAsLender($lenderId: Bytes!) {
  invoices(where: { lender: $lenderId, status: LOANED }) {
    id
    tokenId
    borrower { id }
    loanAmount
    interest
    dueDate
    createdAt
  }
}"#;

pub const GET_LISTED_INVOICE_TOKEN_IDS: &str = r#"query GetListedInvoiceTokenIds {
  invoices(where: { status: LISTED }) {
    tokenId
  }
}"#;

pub const GET_LISTED_INVOICE_TOKEN_IDS_BY_PAYER: &str =
    r#"query GetListedInvoiceTokenIdsByPayer($payerName: String!) {
  invoices(where: { status: LISTED, payerName_contains_nocase: $payerName }) {
    tokenId
  }
}"#;

pub static GET_MINTED_INVOICES_BY_TOKEN_IDS: Lazy<String> = Lazy::new(|| {
    format!(
        r#"query GetMintedInvoicesByTokenIds($tokenIds: [BigInt!]!) {{
  invoiceMinteds(where: {{ tokenId_in: $tokenIds }}) {{ {MINTED_FIELDS} }}
}}"#
    )
});

pub static GET_INVOICE_MINTED_BY_TOKEN_ID: Lazy<String> = Lazy::new(|| {
    format!(
        r#"query GetInvoiceMintedByTokenId($tokenId: BigInt!) {{
  invoiceMinteds(where: {{ tokenId: $tokenId }}) {{ {MINTED_FIELDS} }}
}}"#
    )
});
