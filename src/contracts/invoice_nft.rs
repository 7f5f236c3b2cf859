use ethers::prelude::abigen;

// The metadata pointer handed to mintInvoice is an IPFS CID; the contract
// stores it verbatim in tokenURIs and echoes it in the InvoiceMinted event,
// which is also what the subgraph's invoiceMinteds entity indexes.
abigen!(
    InvoiceNFT,
    r#"[
        function mintInvoice(string ipfsCID) external returns (uint256)
        function ownerOf(uint256 tokenId) external view returns (address)
        function tokenURIs(uint256 tokenId) external view returns (string)
        function getReputation(address user) external view returns (uint256)
        function approve(address to, uint256 tokenId) external
        event InvoiceMinted(uint256 indexed tokenId, address indexed owner, string ipfsCID)
    ]"#
);
