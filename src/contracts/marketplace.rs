use ethers::prelude::abigen;

// Due dates are unix seconds and amounts are smallest token units on every
// call below; scaling happens in types::conversions before anything reaches
// this boundary.
abigen!(
    LendingMarketplace,
    r#"[
        function listInvoiceForLoan(uint256 tokenId, uint256 dueDate, uint256 amount, string payerName) external
        function offerLoan(uint256 tokenId, address token, uint256 amount, uint256 interest) external
        function acceptLoanOffer(uint256 tokenId, address lender) external
        function repayLoan(uint256 tokenId) external
        function cancelOffer(uint256 tokenId) external
        function claimOverdueInvoice(uint256 tokenId) external
        function addSupportedToken(address token) external
        function loans(uint256 tokenId) external view returns (address borrower, address lender, address token, uint256 loanAmount, uint256 interest, uint256 dueDate, bool isActive)
        function getOffers(uint256 tokenId) external view returns (address[] lenders, uint256[] amounts, uint256[] interests)
        function riskFactor(uint256 tokenId) external view returns (uint256)
        function isInvoiceListed(uint256 tokenId) external view returns (bool)
        function supportedTokens(address token) external view returns (bool)
        function pendingOffers(uint256 tokenId, address lender) external view returns (address token, uint256 amount, uint256 interest)
        function offerLenders(uint256 tokenId, uint256 index) external view returns (address)
        function nftContract() external view returns (address)
        function owner() external view returns (address)
    ]"#
);
