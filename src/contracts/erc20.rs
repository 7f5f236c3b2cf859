use ethers::prelude::abigen;

abigen!(
    IERC20,
    r#"[
        function approve(address spender, uint256 amount) external returns (bool)
        function transfer(address to, uint256 amount) external returns (bool)
        function transferFrom(address from, address to, uint256 amount) external returns (bool)
        function balanceOf(address account) external view returns (uint256)
        function allowance(address owner, address spender) external view returns (uint256)
        function decimals() external view returns (uint8)
        event Approval(address indexed owner, address indexed spender, uint256 value)
        event Transfer(address indexed from, address indexed to, uint256 value)
    ]"#
);
